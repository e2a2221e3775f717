use chrono::NaiveDate;
use std::io::Write;
use tempfile::NamedTempFile;
use yield_forecast::data::{add_months, month_start, months_between};
use yield_forecast::{DataLoader, MonthlyPoint, MonthlySeries};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_data_loader_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "uid,date,crop_type,yield_values").unwrap();
    writeln!(file, "1,2023-01-05,Mango,10.5").unwrap();
    writeln!(file, "2,2023-01-20,Mango,4.5").unwrap();
    writeln!(file, "3,2023-02-01,Rice,7").unwrap();

    let rows = DataLoader::from_csv(file.path()).unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].uid, Some(1));
    assert_eq!(rows[0].date, date(2023, 1, 5));
    assert_eq!(rows[0].category, "Mango");
    assert_eq!(rows[0].value, 10.5);
    assert_eq!(rows[2].category, "Rice");
    assert_eq!(rows[2].value, 7.0);
}

#[test]
fn test_data_loader_without_uid() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,category,value").unwrap();
    writeln!(file, "2023-03-01,Corn,1.25").unwrap();

    let rows = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].uid, None);
    assert_eq!(rows[0].date, date(2023, 3, 1));
}

#[test]
fn test_data_loader_error_handling() {
    // Non-existent file
    assert!(DataLoader::from_csv("nonexistent_file.csv").is_err());

    // Missing required columns
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "invalid,csv,format").unwrap();
    writeln!(file, "1,2,3").unwrap();
    assert!(DataLoader::from_csv(file.path()).is_err());

    // Unparsable date
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,category,value").unwrap();
    writeln!(file, "05/01/2023,Corn,1.0").unwrap();
    assert!(DataLoader::from_csv(file.path()).is_err());
}

#[test]
fn test_monthly_series_validation() {
    let ok = MonthlySeries::new(
        "Corn",
        vec![
            MonthlyPoint::new(date(2023, 1, 1), 1.0),
            MonthlyPoint::new(date(2023, 3, 1), 2.0),
        ],
    )
    .unwrap();
    assert_eq!(ok.len(), 2);
    assert!(!ok.is_regular());
    assert_eq!(ok.value_at(date(2023, 3, 1)), Some(2.0));
    assert_eq!(ok.value_at(date(2023, 2, 1)), None);

    // Not a month start
    assert!(MonthlySeries::new("Corn", vec![MonthlyPoint::new(date(2023, 1, 2), 1.0)]).is_err());

    // Duplicate period
    assert!(MonthlySeries::new(
        "Corn",
        vec![
            MonthlyPoint::new(date(2023, 1, 1), 1.0),
            MonthlyPoint::new(date(2023, 1, 1), 2.0),
        ],
    )
    .is_err());
}

#[test]
fn test_from_values_and_tail() {
    let series = MonthlySeries::from_values("Corn", date(2022, 11, 15), &[1.0, 2.0, 3.0, 4.0]).unwrap();

    assert!(series.is_regular());
    assert_eq!(series.first_period(), Some(date(2022, 11, 1)));
    assert_eq!(series.last_period(), Some(date(2023, 2, 1)));

    let tail = series.tail(2);
    assert_eq!(tail.values(), vec![3.0, 4.0]);
    assert_eq!(series.tail(10).len(), 4);
}

#[test]
fn test_month_arithmetic() {
    assert_eq!(month_start(date(2024, 2, 29)), date(2024, 2, 1));
    assert_eq!(add_months(date(2023, 11, 1), 3).unwrap(), date(2024, 2, 1));
    assert_eq!(add_months(date(2023, 1, 1), -35).unwrap(), date(2020, 2, 1));
    assert_eq!(months_between(date(2020, 2, 1), date(2023, 1, 1)), 35);
    assert_eq!(months_between(date(2023, 1, 1), date(2022, 12, 1)), -1);
}
