use chrono::NaiveDate;

/// Filters that can be applied to video listings.
#[derive(Debug, Clone, Default)]
pub struct VideoFilters {
    /// Channel id or display name, matched exactly.
    pub channel: Option<String>,
    /// Inclusive bounds on the effective air date.
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Effective air date as `YYYY-MM-DD` text, for the `vm` alias.
const AIRED_DAY: &str = "substr(COALESCE(vm.release_timestamp, vm.timestamp), 1, 10)";

impl VideoFilters {
    /// Build WHERE clause fragments and params for `video_metadata vm` queries.
    /// Returns (clause_parts, param_values) where clause_parts are AND-able conditions.
    pub fn conditions(&self) -> (Vec<String>, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref channel) = self.channel {
            let n = params.len() + 1;
            conditions.push(format!("(vm.channel_id = ?{n} OR vm.channel_name = ?{n})"));
            params.push(Box::new(channel.clone()));
        }

        if let Some(from) = self.from_date {
            conditions.push(format!("{AIRED_DAY} >= ?{}", params.len() + 1));
            params.push(Box::new(from.to_string()));
        }

        if let Some(to) = self.to_date {
            conditions.push(format!("{AIRED_DAY} <= ?{}", params.len() + 1));
            params.push(Box::new(to.to_string()));
        }

        (conditions, params)
    }
}
