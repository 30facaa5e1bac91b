//! Mechanyx validation jobs.
//!
//! Each subcommand of the `mechanyx` binary lives in [`commands`] as a
//! plain function over a [`commands::Context`], so jobs can be driven from
//! tests exactly as the CLI drives them.

pub mod commands;

use mechanyx_common::MechanyxError;

/// Process exit code for a failed job: 2 when the job refused to run on
/// missing or invalid inputs, 1 for anything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let refusal = err
        .chain()
        .find_map(|e| e.downcast_ref::<MechanyxError>())
        .is_some_and(MechanyxError::is_refusal);
    if refusal {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        let missing: anyhow::Result<()> = Err(MechanyxError::MissingInput(PathBuf::from("x.json")).into());
        let wrapped = missing.context("loading eval set").unwrap_err();
        assert_eq!(exit_code(&wrapped), 2);

        let empty = anyhow::Error::from(MechanyxError::EmptyDataset("no cases".into()));
        assert_eq!(exit_code(&empty), 2);

        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
        assert_eq!(exit_code(&MechanyxError::Config("bad".into()).into()), 1);
    }
}
