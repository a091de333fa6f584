//! Platform names of the counter group events.

use super::ffi::{check_kpep, kpep_event, Kpep, KpepDb};
use crate::counters::NUM_COUNTERS;
use crate::{Error, Result};
use std::ffi::CString;

/// Candidate database names per event, in snapshot order. The first name the database knows wins.
pub const EVENT_ALIASES: [(&str, &[&str]); NUM_COUNTERS] = [
    ("cycles", &["FIXED_CYCLES"]),
    ("branches", &["INST_BRANCH"]),
    ("missed_branches", &["BRANCH_MISPRED_NONSPEC"]),
    ("instructions", &["FIXED_INSTRUCTIONS"]),
];

/// Look up the first alias of `event` known to `db`.
pub fn find_event(
    kpep: &Kpep,
    db: &KpepDb<'_>,
    event: &'static str,
    aliases: &[&str],
) -> Result<*mut kpep_event> {
    for alias in aliases {
        let name = CString::new(*alias).map_err(|_| Error::EventNotFound(event))?;
        let mut ev = std::ptr::null_mut();
        let rc = unsafe { (kpep.kpep_db_event)(db.ptr, name.as_ptr(), &mut ev) };
        if rc == 0 && !ev.is_null() {
            log::debug!("using {} for {}", alias, event);
            return Ok(ev);
        }
        if let Err(Error::OutOfMemory) = check_kpep("kpep_db_event", rc) {
            return Err(Error::OutOfMemory);
        }
    }
    Err(Error::EventNotFound(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_event_has_aliases() {
        let names: Vec<&str> = EVENT_ALIASES.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec!["cycles", "branches", "missed_branches", "instructions"]
        );
        assert!(EVENT_ALIASES.iter().all(|(_, aliases)| !aliases.is_empty()));
    }

    #[test]
    fn test_branch_aliases_count_branches() {
        let (_, instructions) = EVENT_ALIASES[3];
        for &(event, aliases) in EVENT_ALIASES[1..3].iter() {
            for alias in aliases {
                assert!(alias.contains("BRANCH"), "{} counted by {}", event, alias);
                assert!(!instructions.contains(alias), "{} counted by {}", event, alias);
            }
        }
    }
}
