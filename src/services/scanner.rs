//! Simulated inbox and cloud-storage scans.
//!
//! Each integration kind returns a fixed set of bill-like items. Timestamps
//! are relative to `now` so results look fresh on every sync.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::integration::{ExtractedBill, FoundBill, IntegrationKind, SyncResults};

fn extracted(vendor: &str, amount_cents: i64, due: (i32, u32, u32)) -> ExtractedBill {
    ExtractedBill {
        vendor: vendor.to_string(),
        amount_cents,
        due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap_or_default(),
    }
}

fn email(subject: &str, from: &str, age_days: i64, now: DateTime<Utc>, bill: ExtractedBill) -> FoundBill {
    FoundBill::Email {
        subject: subject.to_string(),
        from: from.to_string(),
        date: now - Duration::days(age_days),
        extracted: bill,
    }
}

fn file(filename: &str, size: i64, age_days: i64, now: DateTime<Utc>, bill: ExtractedBill) -> FoundBill {
    FoundBill::File {
        filename: filename.to_string(),
        path: format!("/Bills/{filename}"),
        size,
        modified: now - Duration::days(age_days),
        extracted: bill,
    }
}

pub fn scan(kind: IntegrationKind, now: DateTime<Utc>) -> SyncResults {
    match kind {
        IntegrationKind::Email => scan_inbox(now),
        IntegrationKind::Dropbox => scan_dropbox(now),
        IntegrationKind::GoogleAssistant | IntegrationKind::Alexa => SyncResults {
            scanned: 0,
            found: 0,
            bills: Vec::new(),
        },
    }
}

fn scan_inbox(now: DateTime<Utc>) -> SyncResults {
    let bills = vec![
        email(
            "Your Electric Bill for April 2025",
            "billing@acmeutilities.com",
            2,
            now,
            extracted("ACME Utilities", 8550, (2025, 4, 15)),
        ),
        email(
            "Internet Service Invoice #INV-8765",
            "billing@fastinternet.com",
            3,
            now,
            extracted("Fast Internet", 5999, (2025, 4, 18)),
        ),
        email(
            "Your Netflix Subscription",
            "info@netflix.com",
            1,
            now,
            extracted("Netflix", 1599, (2025, 4, 22)),
        ),
    ];
    SyncResults {
        scanned: 15,
        found: bills.len() as u32,
        bills,
    }
}

fn scan_dropbox(now: DateTime<Utc>) -> SyncResults {
    let bills = vec![
        file(
            "water_bill_april_2025.pdf",
            1_250_000,
            5,
            now,
            extracted("City Water Department", 4575, (2025, 4, 28)),
        ),
        file(
            "car_insurance_q2_2025.pdf",
            2_340_000,
            7,
            now,
            extracted("Safe Auto Insurance", 32000, (2025, 5, 15)),
        ),
    ];
    SyncResults {
        scanned: 25,
        found: bills.len() as u32,
        bills,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_finds_three_bills() {
        let now = Utc::now();
        let results = scan(IntegrationKind::Email, now);

        assert_eq!(results.scanned, 15);
        assert_eq!(results.found, 3);
        match &results.bills[0] {
            FoundBill::Email { from, date, extracted, .. } => {
                assert_eq!(from, "billing@acmeutilities.com");
                assert_eq!(*date, now - Duration::days(2));
                assert_eq!(extracted.amount_cents, 8550);
            }
            other => panic!("expected email item, got {other:?}"),
        }
    }

    #[test]
    fn dropbox_finds_two_files() {
        let now = Utc::now();
        let results = scan(IntegrationKind::Dropbox, now);

        assert_eq!(results.scanned, 25);
        assert_eq!(results.found, 2);
        match &results.bills[1] {
            FoundBill::File { path, size, extracted, .. } => {
                assert_eq!(path, "/Bills/car_insurance_q2_2025.pdf");
                assert_eq!(*size, 2_340_000);
                assert_eq!(extracted.vendor, "Safe Auto Insurance");
                assert_eq!(extracted.amount_cents, 32000);
            }
            other => panic!("expected file item, got {other:?}"),
        }
    }

    #[test]
    fn assistants_have_nothing_to_scan() {
        let results = scan(IntegrationKind::Alexa, Utc::now());
        assert_eq!(results.found, 0);
        assert!(results.bills.is_empty());
    }

    #[test]
    fn items_serialize_without_variant_tags() {
        let json = serde_json::to_value(scan(IntegrationKind::Email, Utc::now())).unwrap();
        assert_eq!(json["bills"][2]["subject"], "Your Netflix Subscription");
        assert_eq!(json["bills"][2]["extracted"]["due_date"], "2025-04-22");
    }
}
