pub const SYSTEM_COLUMN: &str = "system_name";
pub const CREATOR_COLUMN: &str = "creator";
pub const OVERALL_LABEL: &str = "Overall";

/// Ordered grouping columns for one reducing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey(Vec<String>);

impl GroupKey {
    pub fn new(by_creator: bool, skip_group_system: bool, group_by: &[String]) -> Self {
        let mut columns = Vec::with_capacity(group_by.len() + 1);
        if !skip_group_system {
            columns.push(Self::identity_column(by_creator).to_string());
        }
        columns.extend(group_by.iter().cloned());
        Self(columns)
    }

    pub fn identity_column(by_creator: bool) -> &'static str {
        if by_creator {
            CREATOR_COLUMN
        } else {
            SYSTEM_COLUMN
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
