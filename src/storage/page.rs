use std::fmt;

/// Page number within the underlying store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A page number together with its full payload.
///
/// Every page held by the cache is owned by exactly one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    id: PageId,
    data: Box<[u8]>,
}

impl Page {
    /// Create a zero-filled page.
    pub fn new(id: PageId, page_size: usize) -> Self {
        Self {
            id,
            data: vec![0u8; page_size].into_boxed_slice(),
        }
    }

    /// Create a page holding a copy of `data`.
    pub fn from_data(id: PageId, data: &[u8]) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
