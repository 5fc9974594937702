use chrono::NaiveDate;
use rust_decimal::Decimal;
use sheetfeed_core::{header_row, Destination, StageError, TransactionRecord};
use sheetfeed_upload::{upload_records, MemorySheets, SheetsApi, UploadOptions};
use std::str::FromStr;

fn record(date: (i32, u32, u32), desc: &str, amount: &str) -> TransactionRecord {
    TransactionRecord::new(
        NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        desc,
        Decimal::from_str(amount).unwrap(),
    )
}

fn coffee_and_salary() -> Vec<TransactionRecord> {
    vec![
        record((2024, 1, 2), "Coffee", "-4.50"),
        record((2024, 1, 3), "Salary", "2000.00"),
    ]
}

fn dest() -> Destination {
    Destination::new("spreadsheet-1", "Raw_Data")
}

fn header_count(rows: &[Vec<String>]) -> usize {
    let header = header_row();
    rows.iter().filter(|r| **r == header).count()
}

#[tokio::test]
async fn test_round_trip_into_new_tab() {
    let sheets = MemorySheets::new().with_tab("Summary", Vec::new());
    let report = upload_records(&sheets, &dest(), &coffee_and_salary(), &UploadOptions::default())
        .await
        .unwrap();

    assert!(report.tab_created);
    assert!(report.header_written);
    assert_eq!(report.rows_appended, 2);

    let rows = sheets.rows("Raw_Data").await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], header_row());
    assert_eq!(rows[1][0], "2024-01-02");
    assert_eq!(rows[1][4], "Coffee");
    assert_eq!(rows[1][7], "-4.50");
    assert_eq!(rows[2][0], "2024-01-03");
    assert_eq!(rows[2][4], "Salary");
    assert_eq!(rows[2][7], "2000.00");

    let titles = sheets.tab_titles(&dest()).await.unwrap();
    assert_eq!(titles, vec!["Summary".to_string(), "Raw_Data".to_string()]);
}

#[tokio::test]
async fn test_second_upload_appends_without_clearing() {
    let sheets = MemorySheets::new();
    let opts = UploadOptions::default();
    upload_records(&sheets, &dest(), &coffee_and_salary(), &opts)
        .await
        .unwrap();
    let report = upload_records(&sheets, &dest(), &coffee_and_salary(), &opts)
        .await
        .unwrap();

    assert!(!report.tab_created);
    assert!(!report.header_written);
    let rows = sheets.rows("Raw_Data").await;
    assert_eq!(rows.len(), 5);
    assert_eq!(header_count(&rows), 1);
    // duplicates are kept
    assert_eq!(rows[1], rows[3]);
}

#[tokio::test]
async fn test_existing_rows_are_left_alone() {
    let existing = vec![
        header_row(),
        vec!["2023-12-31".to_string(), String::new(), String::new(), String::new(), "Old".to_string()],
    ];
    let sheets = MemorySheets::new().with_tab("Raw_Data", existing.clone());
    upload_records(&sheets, &dest(), &coffee_and_salary(), &UploadOptions::default())
        .await
        .unwrap();

    let rows = sheets.rows("Raw_Data").await;
    assert_eq!(&rows[..2], &existing[..]);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[2][4], "Coffee");
}

#[tokio::test]
async fn test_foreign_header_is_reported_not_rewritten() {
    let foreign = vec![vec!["Date".to_string(), "What".to_string(), "How much".to_string()]];
    let sheets = MemorySheets::new().with_tab("Raw_Data", foreign.clone());
    let report = upload_records(&sheets, &dest(), &coffee_and_salary(), &UploadOptions::default())
        .await
        .unwrap();

    assert!(report.header_mismatch);
    assert!(!report.header_written);
    let rows = sheets.rows("Raw_Data").await;
    assert_eq!(rows[0], foreign[0]);
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_rejected_batch_stops_later_batches() {
    let records: Vec<_> = (1..=5)
        .map(|d| record((2024, 1, d), &format!("Row {d}"), "-1.00"))
        .collect();
    // call 0 writes the header, call 1 the first batch, call 2 the second
    let sheets = MemorySheets::new()
        .with_tab("Raw_Data", Vec::new())
        .reject_append_call(2);
    let err = upload_records(&sheets, &dest(), &records, &UploadOptions { batch_rows: 2 })
        .await
        .unwrap_err();

    match err {
        StageError::UploadRejected {
            first_index,
            last_index,
            rows_appended,
            ..
        } => {
            assert_eq!((first_index, last_index), (2, 3));
            assert_eq!(rows_appended, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(sheets.append_calls().await, 3);

    let rows = sheets.rows("Raw_Data").await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2][4], "Row 2");
}

#[tokio::test]
async fn test_unauthorized_service_account() {
    let sheets = MemorySheets::new().unauthorized();
    let err = upload_records(&sheets, &dest(), &coffee_and_salary(), &UploadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StageError::AuthenticationFailure { .. }));
    assert_eq!(sheets.append_calls().await, 0);
}

#[tokio::test]
async fn test_formula_text_is_escaped() {
    let sheets = MemorySheets::new();
    let records = vec![record((2024, 1, 2), "=HYPERLINK(\"x\")", "-1.00")];
    upload_records(&sheets, &dest(), &records, &UploadOptions::default())
        .await
        .unwrap();
    let rows = sheets.rows("Raw_Data").await;
    assert_eq!(rows[1][4], "'=HYPERLINK(\"x\")");
}
