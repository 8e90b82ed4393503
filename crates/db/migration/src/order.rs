use std::{collections::HashSet, fmt};

/// Number of digits in the millisecond timestamp that prefixes every unit name.
const ID_DIGITS: usize = 13;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("migration name `{0}` is not `<13-digit-timestamp>-<PascalCaseDescription>`")]
    InvalidName(String),
    #[error("migrations `{first}` and `{second}` share the identifier {id}")]
    DuplicateId { id: u64, first: String, second: String },
    #[error("migration `{0}` is recorded as applied but is not known to this build")]
    UnknownApplied(String),
    #[error("migration `{pending}` is older than the already applied `{latest_applied}`")]
    OutOfOrder {
        pending: String,
        latest_applied: String,
    },
}

/// Identifier and description parsed out of a unit name such as
/// `1709251200000-CreateOrganizations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MigrationId<'a> {
    pub id: u64,
    pub description: &'a str,
}

impl<'a> MigrationId<'a> {
    pub fn parse(name: &'a str) -> Result<Self, OrderError> {
        let invalid = || OrderError::InvalidName(name.to_string());
        let (digits, description) = name.split_once('-').ok_or_else(invalid)?;
        if digits.len() != ID_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let mut chars = description.chars();
        match chars.next() {
            Some(c) if c.is_ascii_uppercase() => {}
            _ => return Err(invalid()),
        }
        if !chars.all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        let id = digits.parse().map_err(|_| invalid())?;
        Ok(Self { id, description })
    }
}

impl fmt::Display for MigrationId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:013}-{}", self.id, self.description)
    }
}

/// Sort items by the identifier embedded in their name, regardless of the
/// order they were declared in. Every name must be valid and ids unique.
pub fn sort_by_id<T>(items: &mut [T], name: impl Fn(&T) -> &str) -> Result<(), OrderError> {
    let mut keyed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let parsed = MigrationId::parse(name(item))?;
        keyed.push((parsed.id, index));
    }
    keyed.sort_unstable();
    for pair in keyed.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(OrderError::DuplicateId {
                id: pair[0].0,
                first: name(&items[pair[0].1]).to_string(),
                second: name(&items[pair[1].1]).to_string(),
            });
        }
    }

    // apply the permutation computed above in place
    let mut rank = vec![0; items.len()];
    for (position, (_, index)) in keyed.iter().enumerate() {
        rank[*index] = position;
    }
    for i in 0..items.len() {
        while rank[i] != i {
            let target = rank[i];
            items.swap(i, target);
            rank.swap(i, target);
        }
    }
    Ok(())
}

/// Decide which known units still have to run, in the order they must run.
///
/// `known` is every unit this build ships, in any order. `applied` is the
/// content of the bookkeeping table. A unit that is pending while a unit with
/// a higher identifier has already been applied can never be applied in order,
/// so the whole plan is rejected before any statement executes.
pub fn plan_pending(known: &[&str], applied: &[String]) -> Result<Vec<String>, OrderError> {
    let mut ordered: Vec<&str> = known.to_vec();
    sort_by_id(&mut ordered, |name| *name)?;

    let known_set: HashSet<&str> = ordered.iter().copied().collect();
    if let Some(unknown) = applied.iter().find(|name| !known_set.contains(name.as_str())) {
        return Err(OrderError::UnknownApplied(unknown.clone()));
    }

    let applied_set: HashSet<&str> = applied.iter().map(String::as_str).collect();
    let latest_applied = ordered
        .iter()
        .rev()
        .find(|name| applied_set.contains(*name))
        .copied();

    let mut pending = Vec::new();
    for name in ordered {
        if applied_set.contains(name) {
            continue;
        }
        if let Some(latest) = latest_applied {
            if MigrationId::parse(name)?.id < MigrationId::parse(latest)?.id {
                return Err(OrderError::OutOfOrder {
                    pending: name.to_string(),
                    latest_applied: latest.to_string(),
                });
            }
        }
        pending.push(name.to_string());
    }
    Ok(pending)
}
