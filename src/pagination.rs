use crate::config::PaginationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }
    }

    /// Page numbers start at 1; a zero size means "use the default".
    pub fn normalise(self, config: &PaginationConfig) -> Self {
        let page = self.page.max(1);
        let page_size = match self.page_size {
            0 => config.default_page_size,
            n => n.min(config.max_page_size),
        };
        Self { page, page_size }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    /// Matching rows before slicing.
    pub total: usize,
}

impl<T> Page<T> {
    pub fn slice(all: Vec<T>, request: PageRequest, config: &PaginationConfig) -> Self {
        let request = request.normalise(config);
        let total = all.len();
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.page_size)
            .collect();

        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total,
        }
    }
}
