use std::collections::HashSet;

use uuid::Uuid;

use crate::{error::AppError, models::ReorderItem};

/// validate_reorder
///
/// A reorder request must be non-empty, name each item once, and its positions, once sorted,
/// must read exactly `1, 2, ..., N`. Anything else is rejected before touching the database.
pub fn validate_reorder(items: &[ReorderItem]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::BadRequest("Items are required".into()));
    }

    let mut seen = HashSet::with_capacity(items.len());
    if !items.iter().all(|item| seen.insert(item.id)) {
        return Err(AppError::BadRequest("Each item may appear only once".into()));
    }

    let mut positions: Vec<i32> = items.iter().map(|item| item.position).collect();
    positions.sort_unstable();
    let contiguous = positions
        .iter()
        .enumerate()
        .all(|(index, position)| *position as i64 == index as i64 + 1);

    if !contiguous {
        return Err(AppError::BadRequest(
            "Positions must be continuous starting from 1".into(),
        ));
    }

    Ok(())
}

/// Checks that a reorder names exactly the items currently stored for the parent.
/// Used inside the repository transaction once the current ids are locked.
pub fn ensure_complete_reorder(items: &[ReorderItem], current: &[Uuid]) -> Result<(), AppError> {
    let requested: HashSet<Uuid> = items.iter().map(|item| item.id).collect();
    let stored: HashSet<Uuid> = current.iter().copied().collect();

    if requested != stored {
        return Err(AppError::BadRequest(
            "Reorder must include every item exactly once".into(),
        ));
    }
    Ok(())
}

/// Where a new course item may go: anywhere in `1..=count + 1`.
pub fn strict_insert_position(requested: i32, count: i64) -> Result<i32, AppError> {
    if requested < 1 || requested as i64 > count + 1 {
        return Err(AppError::BadRequest(format!(
            "Position must be between 1 and {}",
            count + 1
        )));
    }
    Ok(requested)
}

/// Learning paths are lenient: a missing or out-of-range position appends.
pub fn lenient_insert_position(requested: Option<i32>, count: i64) -> i32 {
    let append = (count + 1) as i32;
    match requested {
        Some(position) if position >= 1 && position as i64 <= count + 1 => position,
        _ => append,
    }
}

/// slugify
///
/// Lower-cases and joins alphanumeric runs with single hyphens:
/// `"Data & AI"` becomes `"data-ai"`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for ch in input.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}
