/// One entry of the server list: identity, labels and revisit intervals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerSpec {
    pub url: String,
    pub short_name: String,
    pub description: String,
    /// Minimum calendar days between crawls; 0 means always.
    pub revisit_days: u32,
    /// Minimum calendar days between count passes; 0 means always.
    pub count_revisit_days: u32,
}

impl ServerSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_revisit_days(mut self, days: u32) -> Self {
        self.revisit_days = days;
        self
    }

    pub fn with_count_revisit_days(mut self, days: u32) -> Self {
        self.count_revisit_days = days;
        self
    }
}
