mod support;

use support::model;
use unimodel_rs::error::TransformErrorKind;
use unimodel_rs::{CancelToken, Mapping, MappingDocument, Row, TemplateError, Unimodel};

const PEOPLE: &str = r#"
[[queries]]
name = "people"

[queries.entities.person]
schema = "Person"
keys = ["name"]

[queries.entities.person.properties.name]
column = "name"

[queries.entities.person.properties.birthDate]
column = "dob"

[queries.entities.person.properties.email]
column = "email"
"#;

fn row(cells: &[(&str, &str)]) -> Row {
    cells
        .iter()
        .map(|(column, value)| (column.to_string(), value.to_string()))
        .collect()
}

#[test]
fn unparseable_date_only_drops_that_property() -> anyhow::Result<()> {
    let document = MappingDocument::from_toml_str(PEOPLE)?;
    let mapping = Mapping::compile(model(), &document, "people")?;
    let rows = vec![row(&[
        ("name", "Jane Doe"),
        ("dob", "not-a-date"),
        ("email", "jane@example.org"),
    ])];

    let output = mapping.run(&rows, &CancelToken::new());
    assert_eq!(output.errors.len(), 1);
    let error = &output.errors[0];
    assert_eq!(error.property.as_deref(), Some("birthDate"));
    assert!(matches!(
        &error.kind,
        TransformErrorKind::Unparseable { value, .. } if value == "not-a-date"
    ));
    assert_eq!(output.rows_skipped, 0);

    let mut properties: Vec<&str> = output
        .statements
        .iter()
        .filter(|statement| !statement.is_marker())
        .map(|statement| statement.property.as_str())
        .collect();
    properties.sort_unstable();
    assert_eq!(properties, ["email", "name"]);
    Ok(())
}

#[test]
fn missing_column_skips_row_and_run_continues() -> anyhow::Result<()> {
    let document = MappingDocument::from_toml_str(PEOPLE)?;
    let mut engine = Unimodel::new(model());
    let rows = vec![
        row(&[("name", "Broken Row"), ("email", "broken@example.org")]),
        row(&[("name", "Jane Doe"), ("dob", "1970-01-01"), ("email", "jane@example.org")]),
    ];

    let report = engine.run_mapping(&document, &rows, &CancelToken::new())?;
    assert_eq!(report.rows_read, 2);
    assert_eq!(report.rows_skipped, 1);
    assert!(report.transform_errors[0].skips_row());
    assert_eq!(engine.entities().count(), 1);
    assert!(report.to_string().contains("column dob is missing"));
    Ok(())
}

#[test]
fn template_errors_are_fatal() {
    let document = MappingDocument::from_toml_str(
        r#"
        [[queries]]
        [queries.entities.person]
        schema = "Person"
        [queries.entities.person.properties.shoeSize]
        column = "shoe"
        "#,
    )
    .expect("parses");
    let mut engine = Unimodel::new(model());
    let err = engine
        .run_mapping(&document, &Vec::<Row>::new(), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TemplateError>(),
        Some(TemplateError::UnknownProperty { property, .. }) if property == "shoeSize"
    ));
}
