//! Matching free-text requests ("the trash is full") to configured chores.

use crate::error::{Result, RotaError};
use crate::model::Chore;

/// Find the chore a request refers to.
///
/// Explicit `category` tags win: a chore matches when every word of its
/// category appears as a word in `text`. Failing that, titles are compared
/// as case-insensitive substrings in either direction. The first match in
/// configuration order is returned.
///
/// # Errors
///
/// Returns [`RotaError::NoMatchingChore`] when nothing matches.
pub fn resolve_chore<'a>(chores: &'a [Chore], text: &str) -> Result<&'a Chore> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return Err(RotaError::NoMatchingChore(String::new()));
    }
    let tokens = words(&needle);

    let by_category = chores.iter().find(|chore| {
        chore.category.as_deref().is_some_and(|category| {
            let tag = words_of(category);
            !tag.is_empty() && tag.iter().all(|w| tokens.contains(&w.as_str()))
        })
    });
    if let Some(chore) = by_category {
        tracing::debug!(chore = %chore.title, "matched request by category");
        return Ok(chore);
    }

    chores
        .iter()
        .find(|chore| {
            let title = chore.title.to_lowercase();
            needle.contains(&title) || title.contains(&needle)
        })
        .inspect(|chore| tracing::debug!(chore = %chore.title, "matched request by title"))
        .ok_or_else(|| RotaError::NoMatchingChore(text.trim().to_string()))
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn words_of(category: &str) -> Vec<String> {
    let lowered = category.to_lowercase();
    words(&lowered).into_iter().map(str::to_string).collect()
}
