mod common;

use std::fs;

use common::{TestWorkspace, CUSTOMERS_CSV, SALES_CSV};
use retail_scrub::{
    data::Value,
    datasets::{Dataset, sale_schema},
    error::{SchemaError, ScrubError},
    pipeline::{ScrubOptions, Scrubber},
    prepare,
    table::Table,
};

fn scrub_sales(records: Vec<Vec<&str>>, strict: bool) -> Result<retail_scrub::pipeline::ScrubOutcome, ScrubError> {
    let raw = Table::from_raw(
        [
            "transaction_id",
            "customer_id",
            "product_id",
            "store_id",
            "campaign_id",
            "sale_amount",
            "sale_date",
            "discount_percent",
        ],
        records,
    );
    Scrubber::new(
        sale_schema(),
        ScrubOptions {
            strict,
            ..ScrubOptions::default()
        },
    )
    .expect("valid descriptor")
    .scrub(&raw)
}

#[test]
fn missing_campaign_becomes_zero_and_ids_become_integers() {
    let outcome = scrub_sales(
        vec![vec!["5", "12", "7", "3", "", "99.99", "2025-01-31", "0"]],
        false,
    )
    .unwrap();
    let prepared = &outcome.prepared;
    assert_eq!(prepared.len(), 1);
    assert_eq!(prepared.cell(0, "sale_id"), Some(&Some(Value::Integer(5))));
    assert_eq!(prepared.cell(0, "customer_id"), Some(&Some(Value::Integer(12))));
    assert_eq!(prepared.cell(0, "campaign_id"), Some(&Some(Value::Integer(0))));
    assert_eq!(outcome.report.missing["campaign_id"].cells_filled, 1);
}

#[test]
fn explicit_zero_campaign_is_left_alone() {
    let outcome = scrub_sales(
        vec![vec!["5", "12", "7", "3", "0", "99.99", "2025-01-31", "0"]],
        false,
    )
    .unwrap();
    assert_eq!(
        outcome.prepared.cell(0, "campaign_id"),
        Some(&Some(Value::Integer(0)))
    );
    assert_eq!(outcome.report.missing["campaign_id"].cells_filled, 0);
    assert!(outcome.report.coercion_failures.is_empty());
}

#[test]
fn out_of_range_discount_is_flagged_or_dropped_in_strict_mode() {
    let record = vec!["5", "12", "7", "3", "1", "99.99", "2025-01-31", "150"];

    let lenient = scrub_sales(vec![record.clone()], false).unwrap();
    assert_eq!(lenient.prepared.len(), 1);
    assert_eq!(lenient.report.out_of_range.len(), 1);
    assert_eq!(lenient.report.out_of_range[0].column, "discount_percent");
    assert_eq!(lenient.report.rows_dropped_strict, 0);

    let strict = scrub_sales(vec![record], true).unwrap();
    assert!(strict.prepared.is_empty());
    assert_eq!(strict.report.rows_dropped_strict, 1);
}

#[test]
fn foreign_keys_are_non_negative_integers_after_scrubbing() {
    let outcome = scrub_sales(
        vec![
            vec!["1", "12", "7", "3", "2", "10", "2025-01-01", "5"],
            vec!["2", "-4", "7", "3", "2", "10", "2025-01-01", "5"],
            vec!["3", "12.0", "7", "3", "abc", "10", "2025-01-01", "5"],
            vec!["4", "12", "7.5", "3", "", "10", "2025-01-01", "5"],
        ],
        false,
    )
    .unwrap();
    assert_eq!(outcome.prepared.len(), 2);
    for row in outcome.prepared.rows() {
        for column in ["customer_id", "product_id", "store_id", "campaign_id"] {
            let idx = outcome.prepared.column_index(column).unwrap();
            match &row.cells[idx] {
                Some(Value::Integer(id)) => assert!(*id >= 0),
                other => panic!("{column} on line {} is {other:?}", row.line),
            }
        }
    }
    assert_eq!(outcome.report.rows_dropped_invalid, 2);
}

#[test]
fn duplicate_customer_rows_keep_the_first() {
    let raw = Table::from_raw(
        ["CustomerID", "Region", "JoinDate", "LoyaltyPoints", "EngagementStyle"],
        vec![
            vec!["1", "East", "2024-01-01", "10", "Mobile"],
            vec!["1", "West", "2024-02-01", "20", "Desktop"],
        ],
    );
    let outcome = Scrubber::new(Dataset::Customers.schema(), ScrubOptions::default())
        .unwrap()
        .scrub(&raw)
        .unwrap();
    assert_eq!(outcome.prepared.len(), 1);
    assert_eq!(outcome.prepared.cell(0, "region"), Some(&Some(Value::text("East"))));
    assert_eq!(outcome.report.duplicates_removed, 1);
}

#[test]
fn numerically_equal_customer_ids_are_duplicates() {
    let raw = Table::from_raw(
        ["CustomerID", "Region", "JoinDate", "LoyaltyPoints", "EngagementStyle"],
        vec![
            vec!["12", "East", "2024-01-01", "10", "Mobile"],
            vec!["12.0", "West", "2024-02-01", "20", "Desktop"],
        ],
    );
    let outcome = Scrubber::new(Dataset::Customers.schema(), ScrubOptions::default())
        .unwrap()
        .scrub(&raw)
        .unwrap();
    let ids = outcome.prepared.column(0).cloned().collect::<Vec<_>>();
    assert_eq!(ids, vec![Some(Value::Integer(12))]);
    assert_eq!(outcome.report.duplicates_removed, 1);
    assert_eq!(outcome.prepared.cell(0, "region"), Some(&Some(Value::text("East"))));
}

#[test]
fn extreme_loyalty_points_fail_without_panicking() {
    let big = "79228162514264337593543950335";
    let raw = Table::from_raw(
        ["CustomerID", "Region", "JoinDate", "LoyaltyPoints", "EngagementStyle"],
        vec![
            vec!["1", "East", "2024-01-01", big, "Mobile"],
            vec!["2", "East", "2024-01-01", big, "Mobile"],
            vec!["3", "East", "2024-01-01", "", "Mobile"],
        ],
    );
    let err = Scrubber::new(Dataset::Customers.schema(), ScrubOptions::default())
        .unwrap()
        .scrub(&raw)
        .unwrap_err();
    assert!(matches!(err, ScrubError::Coercion(_)));
}

#[test]
fn zero_sale_amount_is_flagged_or_dropped_in_strict_mode() {
    let record = vec!["5", "12", "7", "3", "1", "0.00", "2025-01-31", "0"];

    let lenient = scrub_sales(vec![record.clone()], false).unwrap();
    assert_eq!(lenient.prepared.len(), 1);
    assert_eq!(lenient.report.out_of_range.len(), 1);
    assert_eq!(lenient.report.out_of_range[0].column, "sale_amount");

    let strict = scrub_sales(vec![record], true).unwrap();
    assert!(strict.prepared.is_empty());
    assert_eq!(strict.report.rows_dropped_strict, 1);
}

#[test]
fn loyalty_point_outliers_are_flagged_or_dropped_in_strict_mode() {
    let mut records = (1..=20)
        .map(|id| {
            vec![
                id.to_string(),
                "East".to_string(),
                "2024-01-01".to_string(),
                (100 + id % 3).to_string(),
                "Mobile".to_string(),
            ]
        })
        .collect::<Vec<_>>();
    records.push(vec![
        "21".to_string(),
        "West".to_string(),
        "2024-01-01".to_string(),
        "100000".to_string(),
        "Desktop".to_string(),
    ]);
    let raw = Table::from_raw(
        ["CustomerID", "Region", "JoinDate", "LoyaltyPoints", "EngagementStyle"],
        records,
    );

    let lenient = Scrubber::new(Dataset::Customers.schema(), ScrubOptions::default())
        .unwrap()
        .scrub(&raw)
        .unwrap();
    assert_eq!(lenient.prepared.len(), 21);
    assert_eq!(lenient.report.out_of_range.len(), 1);
    assert_eq!(lenient.report.out_of_range[0].column, "loyalty_points");
    assert_eq!(lenient.report.out_of_range[0].line, 22);

    let strict = Scrubber::new(
        Dataset::Customers.schema(),
        ScrubOptions {
            strict: true,
            ..ScrubOptions::default()
        },
    )
    .unwrap()
    .scrub(&raw)
    .unwrap();
    assert_eq!(strict.prepared.len(), 20);
    assert_eq!(strict.report.rows_dropped_strict, 1);
}

#[test]
fn colliding_column_names_abort_with_schema_error() {
    let raw = Table::from_raw(
        [" Customer ID ", "customer_id", "region"],
        vec![vec!["1", "1", "East"]],
    );
    let err = Scrubber::new(Dataset::Customers.schema(), ScrubOptions::default())
        .unwrap()
        .scrub(&raw)
        .unwrap_err();
    match err {
        ScrubError::Schema(SchemaError::AmbiguousColumn { first, second, canonical }) => {
            assert_eq!(first, " Customer ID ");
            assert_eq!(second, "customer_id");
            assert_eq!(canonical, "customer_id");
        }
        other => panic!("expected ambiguous column error, got {other:?}"),
    }
}

#[test]
fn prepare_writes_prepared_file_and_report() {
    let workspace = TestWorkspace::with_samples();
    let prepared = prepare::run_dataset(Dataset::Customers, &workspace.config()).unwrap();
    assert_eq!(prepared.report.input_rows, 5);
    assert_eq!(prepared.report.output_rows, 4);

    assert_eq!(
        workspace.read_prepared("customers_prepared.csv"),
        "customer_id,region,join_date,loyalty_points,engagement_style\n\
         1001,East,2024-01-05,120,Mobile\n\
         1002,South-West,2024-01-20,80,InStore\n\
         1003,West,2024-02-11,80,Mobile\n\
         1004,Atlantis,2024-03-02,60,Mobile\n"
    );

    let report = workspace.read_report("customers_report.json");
    assert_eq!(report["dataset"], "customers");
    assert_eq!(report["duplicates_removed"], 1);
    assert_eq!(report["missing"]["loyalty_points"]["cells_filled"], 1);
    assert_eq!(report["missing"]["engagement_style"]["cells_filled"], 1);
    assert_eq!(report["unmapped_values"]["region"]["Atlantis"], 1);
    assert_eq!(report["ignored_columns"][0], "name");
    assert_eq!(report["input"]["sha256"].as_str().unwrap().len(), 64);
}

#[test]
fn prepared_sales_keep_sentinel_and_flag_discount() {
    let workspace = TestWorkspace::with_samples();
    let prepared = prepare::run_dataset(Dataset::Sales, &workspace.config()).unwrap();
    assert_eq!(
        workspace.read_prepared("sales_prepared.csv"),
        "sale_id,customer_id,product_id,store_id,campaign_id,sale_amount,sale_date,discount_percent\n\
         5,12,7,401,0,99.99,2025-01-31,10.00\n\
         6,1001,8,402,0,39.50,2025-02-01,0.00\n\
         8,1003,7,403,2,799.99,2025-02-03,150.00\n"
    );
    assert_eq!(prepared.report.missing["store_id"].rows_dropped, 1);
    assert_eq!(prepared.report.out_of_range.len(), 1);
    assert_eq!(prepared.report.out_of_range[0].line, 5);
    assert!(
        prepared
            .report
            .renamed_columns
            .iter()
            .any(|r| r.raw == "TransactionID" && r.canonical == "sale_id")
    );
}

#[test]
fn strict_mode_drops_out_of_range_sales() {
    let workspace = TestWorkspace::with_samples();
    let mut config = workspace.config();
    config.strict = true;
    let prepared = prepare::run_dataset(Dataset::Sales, &config).unwrap();
    assert_eq!(prepared.report.output_rows, 2);
    assert_eq!(prepared.report.rows_dropped_strict, 1);
}

#[test]
fn rerunning_produces_byte_identical_output() {
    let workspace = TestWorkspace::with_samples();
    let config = workspace.config();
    for dataset in Dataset::ALL {
        prepare::run_dataset(dataset, &config).unwrap();
        let first = workspace.read_prepared(&dataset.prepared_file_name());
        prepare::run_dataset(dataset, &config).unwrap();
        let second = workspace.read_prepared(&dataset.prepared_file_name());
        assert_eq!(first, second, "{dataset} output changed between runs");
    }
}

#[test]
fn failed_run_leaves_previous_output_in_place() {
    let workspace = TestWorkspace::new();
    workspace.write_raw("customers.csv", CUSTOMERS_CSV);
    let config = workspace.config();
    prepare::run_dataset(Dataset::Customers, &config).unwrap();
    let before = workspace.read_prepared("customers_prepared.csv");

    workspace.write_raw(
        "customers.csv",
        "Customer ID,customer_id,Region,JoinDate,LoyaltyPoints,EngagementStyle\n1,1,East,,,\n",
    );
    assert!(prepare::run_dataset(Dataset::Customers, &config).is_err());
    assert_eq!(workspace.read_prepared("customers_prepared.csv"), before);
}

#[test]
fn failing_sales_run_writes_nothing() {
    let workspace = TestWorkspace::new();
    workspace.write_raw("sales.csv", &SALES_CSV.replace("SaleAmount", "Amount"));
    let err = prepare::run_dataset(Dataset::Sales, &workspace.config()).unwrap_err();
    assert!(format!("{err:#}").contains("sale_amount"));
    assert!(!workspace.prepared_path("sales_prepared.csv").exists());
    assert!(!workspace.prepared_path("sales_report.json").exists());
}

#[test]
fn descriptor_override_directory_is_honoured() {
    let workspace = TestWorkspace::with_samples();
    let mut schema = Dataset::Products.schema();
    schema.columns.retain(|c| c.name != "category");
    let dir = workspace.path().join("schemas");
    fs::create_dir_all(&dir).unwrap();
    schema.save(&dir.join("products.yaml")).unwrap();

    let mut config = workspace.config();
    config.schema = Some(dir);
    prepare::run_dataset(Dataset::Products, &config).unwrap();
    let output = workspace.read_prepared("products_prepared.csv");
    assert!(output.starts_with("product_id,product_name,unit_price\n"));
    assert!(output.contains("9,Cable,5.00\n"));
}
