mod support;

use std::collections::BTreeSet;
use support::model;
use unimodel_rs::test_support::{generate_company_rows, COMPANY_MAPPING};
use unimodel_rs::{CancelToken, Mapping, MappingDocument, Row, Unimodel};

fn mapping() -> anyhow::Result<Mapping> {
    let document = MappingDocument::from_json_str(COMPANY_MAPPING)?;
    Ok(Mapping::compile(model(), &document, "default")?)
}

#[test]
fn repeated_runs_emit_identical_statements() -> anyhow::Result<()> {
    let rows = generate_company_rows(300, 11);
    let mapping = mapping()?;
    let first = mapping.run(&rows, &CancelToken::new());
    let second = mapping.run(&rows, &CancelToken::new());

    assert!(!first.statements.is_empty());
    assert_eq!(first.statements, second.statements);
    assert_eq!(first.errors, second.errors);
    Ok(())
}

#[test]
fn same_keys_yield_same_entity_id() -> anyhow::Result<()> {
    let row = |name: &str| -> Row {
        [
            ("name", name),
            ("reg_no", "HRB 12345"),
            ("country", "de"),
            ("incorporated", "01.02.2003"),
        ]
        .into_iter()
        .map(|(column, value)| (column.to_string(), value.to_string()))
        .collect()
    };
    // Same registration number and jurisdiction; names differ.
    let rows = vec![row("Acme GmbH"), row("ACME Gesellschaft mbH")];
    let mapping = mapping()?;

    let first: BTreeSet<String> = mapping
        .run(&rows, &CancelToken::new())
        .statements
        .into_iter()
        .map(|statement| statement.entity_id)
        .collect();
    let second: BTreeSet<String> = mapping
        .run(&rows, &CancelToken::new())
        .statements
        .into_iter()
        .map(|statement| statement.entity_id)
        .collect();
    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn reingesting_a_mapping_adds_nothing() -> anyhow::Result<()> {
    let rows = generate_company_rows(50, 5);
    let document = MappingDocument::from_json_str(COMPANY_MAPPING)?;
    let mut engine = Unimodel::new(model());

    let first = engine.run_mapping(&document, &rows, &CancelToken::new())?;
    let stored = engine.store().len();
    let second = engine.run_mapping(&document, &rows, &CancelToken::new())?;

    assert!(first.statements_added > 0);
    assert_eq!(second.statements_added, 0);
    assert_eq!(engine.store().len(), stored);
    assert!(first.is_clean(), "{first}");
    Ok(())
}
