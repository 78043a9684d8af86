use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Weekly recurrence: the weekday and local time a chore falls due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub weekday: Weekday,
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

impl Recurrence {
    #[must_use]
    pub const fn new(weekday: Weekday, hour: u32, minute: u32) -> Self {
        Self {
            weekday,
            hour,
            minute,
        }
    }

    /// Hour and minute form a real wall-clock time.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.hour < 24 && self.minute < 60
    }
}

/// A configured household chore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chore {
    pub title: String,

    /// `None` means the chore only happens when someone triggers it.
    #[serde(default)]
    pub recurrence: Option<Recurrence>,

    /// Keep a recurring chore out of the weekly allocation.
    #[serde(default)]
    pub manual_only: bool,

    /// Short tag ("trash", "dishes") used to match ad-hoc requests.
    #[serde(default)]
    pub category: Option<String>,

    /// How many people share the chore when it is scheduled.
    #[serde(default = "default_headcount")]
    pub headcount: usize,
}

const fn default_headcount() -> usize {
    1
}

impl Chore {
    #[must_use]
    pub fn new(title: impl Into<String>, recurrence: Option<Recurrence>) -> Self {
        Self {
            title: title.into(),
            recurrence,
            manual_only: false,
            category: None,
            headcount: default_headcount(),
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub const fn with_headcount(mut self, headcount: usize) -> Self {
        self.headcount = headcount;
        self
    }

    #[must_use]
    pub const fn manual_only(mut self) -> Self {
        self.manual_only = true;
        self
    }

    /// Included in the periodic allocation run.
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        self.recurrence.is_some() && !self.manual_only
    }

    /// Number of people to assign, never less than one.
    #[must_use]
    pub fn slots(&self) -> usize {
        self.headcount.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_chores_are_not_scheduled() {
        let trash = Chore::new("Trash", None);
        assert!(!trash.is_scheduled());

        let vacuum = Chore::new("Vacuum", Some(Recurrence::new(Weekday::Sat, 10, 0))).manual_only();
        assert!(!vacuum.is_scheduled());

        let dishes = Chore::new("Dishes", Some(Recurrence::new(Weekday::Mon, 20, 0)));
        assert!(dishes.is_scheduled());
    }

    #[test]
    fn zero_headcount_still_takes_one_slot() {
        let chore = Chore::new("Bathroom", None).with_headcount(0);
        assert_eq!(chore.slots(), 1);
    }

    #[test]
    fn recurrence_parses_weekday_names_from_toml() {
        let chore: Chore = toml::from_str(
            r#"
title = "Mop floors"
category = "floors"
headcount = 2
recurrence = { weekday = "sunday", hour = 18 }
"#,
        )
        .expect("chore parses");
        let recurrence = chore.recurrence.expect("recurrence present");
        assert_eq!(recurrence.weekday, Weekday::Sun);
        assert_eq!(recurrence.minute, 0);
        assert_eq!(chore.headcount, 2);
        assert!(recurrence.is_valid());
    }
}
