use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::mapping::Row;
use crate::model::Statement;

const FIRST_NAMES: [&str; 8] = [
    "John", "Maria", "Ahmed", "Olga", "Wei", "Fatima", "Lars", "Ana",
];
const LAST_NAMES: [&str; 8] = [
    "Smith", "Garcia", "Hassan", "Ivanova", "Chen", "Okafor", "Berg", "Silva",
];
const COUNTRIES: [&str; 5] = ["de", "fr", "gb", "us", "ng"];
const DATASETS: [&str; 3] = ["registry", "leaks", "sanctions"];

/// Statements describing `count` people. With probability `duplicate_probability`
/// a person is a misspelled copy of an earlier one sharing its passport number.
pub fn generate_people(count: usize, duplicate_probability: f64, seed: u64) -> Vec<Statement> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut people: Vec<(String, String, String)> = Vec::with_capacity(count);
    let mut statements = Vec::with_capacity(count * 4);

    for index in 0..count {
        let id = format!("person-{index:06}");
        let dataset = DATASETS[rng.random_range(0..DATASETS.len())];

        let (name, passport, birth_date) = if index > 0 && rng.random_bool(duplicate_probability) {
            let (name, passport, birth_date) = people[rng.random_range(0..people.len())].clone();
            (misspell(&mut rng, &name), passport, birth_date)
        } else {
            let name = format!(
                "{} {}",
                FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())],
                LAST_NAMES[rng.random_range(0..LAST_NAMES.len())]
            );
            let passport = format!("P{:08}", rng.random_range(0..100_000_000u32));
            let birth_date = format!(
                "{}-{:02}-{:02}",
                rng.random_range(1940..2005),
                rng.random_range(1..=12),
                rng.random_range(1..=28)
            );
            (name, passport, birth_date)
        };

        statements.push(Statement::new(&id, "Person", "name", &name, dataset));
        statements.push(Statement::new(&id, "Person", "passportNumber", &passport, dataset));
        statements.push(Statement::new(&id, "Person", "birthDate", &birth_date, dataset));
        statements.push(Statement::new(
            &id,
            "Person",
            "nationality",
            COUNTRIES[rng.random_range(0..COUNTRIES.len())],
            dataset,
        ));
        people.push((name, passport, birth_date));
    }
    statements
}

/// Drop one letter of a name, keeping its first character.
fn misspell(rng: &mut StdRng, name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() < 3 {
        return name.to_string();
    }
    let drop = rng.random_range(1..chars.len());
    chars
        .iter()
        .enumerate()
        .filter(|(position, _)| *position != drop)
        .map(|(_, c)| *c)
        .collect()
}

/// Source rows of company registrations for mapping runs.
pub fn generate_company_rows(count: usize, seed: u64) -> Vec<Row> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|index| {
            let mut row = Row::new();
            row.insert(
                "name".to_string(),
                format!("{} Holdings {index}", LAST_NAMES[rng.random_range(0..LAST_NAMES.len())]),
            );
            row.insert("reg_no".to_string(), format!("HRB {}", rng.random_range(1000..99_999)));
            row.insert(
                "country".to_string(),
                COUNTRIES[rng.random_range(0..COUNTRIES.len())].to_string(),
            );
            row.insert(
                "incorporated".to_string(),
                format!("{:02}.{:02}.{}", rng.random_range(1..=28), rng.random_range(1..=12), rng.random_range(1950..2024)),
            );
            row
        })
        .collect()
}

/// Mapping template matching [`generate_company_rows`].
pub const COMPANY_MAPPING: &str = r#"{
    "dataset": "companies",
    "queries": [{
        "name": "companies",
        "entities": {
            "company": {
                "schema": "Company",
                "keys": ["registrationNumber", "jurisdiction"],
                "properties": {
                    "name": {"column": "name", "required": true},
                    "registrationNumber": {"column": "reg_no", "transforms": ["strip_punctuation"]},
                    "jurisdiction": {"column": "country"},
                    "incorporationDate": {"column": "incorporated", "format": "%d.%m.%Y"}
                }
            }
        }
    }]
}"#;
