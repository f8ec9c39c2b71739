//! Unit tests covering feature-flag behaviour.

#![cfg(not(feature = "store-sqlite"))]

use super::helpers::LoadFiles;
use super::*;
use rstest::rstest;

#[rstest]
fn load_requires_store_sqlite() {
    let files = LoadFiles::new();
    let args = LoadArgs {
        database: Some(files.database()),
        table: Some("roads".to_owned()),
        input: Some(files.input()),
        ..LoadArgs::default()
    };

    let err = run_load(args).expect_err("missing feature should error");
    match err {
        CliError::MissingFeature { feature, action } => {
            assert_eq!(feature, "store-sqlite");
            assert_eq!(action, "load");
        }
        other => panic!("expected MissingFeature, found {other:?}"),
    }
}
