use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::invoices::InvoiceWithClient;

const HISTOGRAM_BINS: usize = 8;
const TOP_CLIENTS: usize = 5;
const CONCENTRATION_GROUPS: usize = 3;
const STACKED_MONTHS: usize = 12;
const UNKNOWN_GROUP: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTotal {
    /// `YYYY-MM`, or the literal `Unknown` bucket sorted last.
    pub month: String,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRevenue {
    pub client: String,
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub low: f64,
    pub high: f64,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPaidUnpaid {
    pub month: String,
    pub paid: f64,
    pub unpaid: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_invoices: usize,
    pub paid_count: usize,
    pub unpaid_count: usize,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub unpaid_amount: f64,
    pub highest: Option<InvoiceWithClient>,
    pub lowest: Option<InvoiceWithClient>,
    pub monthly_totals: Vec<MonthlyTotal>,
    pub mom_delta_pct: i64,
    pub top_clients: Vec<ClientRevenue>,
    pub top3_share_pct: i64,
    pub avg_invoice_value: i64,
    pub histogram: Vec<HistogramBin>,
    pub monthly_paid_unpaid: Vec<MonthlyPaidUnpaid>,
}

/// A stored amount that is not a finite number counts as zero everywhere,
/// so one bad record cannot poison the aggregates.
fn coerced_amount(invoice: &InvoiceWithClient) -> f64 {
    if invoice.amount.is_finite() {
        invoice.amount
    } else {
        0.0
    }
}

fn round_pct(value: f64) -> i64 {
    value.round() as i64
}

fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Aggregate an owner-scoped set of invoices into the dashboard metrics.
/// Pure and deterministic; `today` only anchors the trailing twelve-month
/// paid/unpaid series, every other bucket uses the record's own date.
pub fn report(items: &[InvoiceWithClient], today: NaiveDate) -> AnalyticsReport {
    let total_invoices = items.len();

    let mut paid_count = 0usize;
    let mut paid_amount = 0.0f64;
    let mut unpaid_amount = 0.0f64;
    for invoice in items {
        let amount = coerced_amount(invoice);
        if invoice.is_paid {
            paid_count += 1;
            paid_amount += amount;
        } else {
            unpaid_amount += amount;
        }
    }
    let unpaid_count = total_invoices - paid_count;
    // Derived, not accumulated separately: float addition is not
    // associative, and paid + unpaid must equal the total exactly.
    let total_amount = paid_amount + unpaid_amount;

    // Extremes: strict comparisons so the first occurrence wins ties.
    let mut highest: Option<&InvoiceWithClient> = None;
    let mut lowest: Option<&InvoiceWithClient> = None;
    for invoice in items {
        let amount = coerced_amount(invoice);
        highest = match highest {
            Some(best) if amount <= coerced_amount(best) => Some(best),
            _ => Some(invoice),
        };
        lowest = match lowest {
            Some(worst) if amount >= coerced_amount(worst) => Some(worst),
            _ => Some(invoice),
        };
    }

    let monthly_totals = monthly_totals(items);
    let mom_delta_pct = month_over_month_delta(&monthly_totals);

    // Group revenue by resolved client name, preserving first-encounter
    // order so the stable sort breaks ties in favour of earlier groups.
    let mut groups: Vec<(String, f64)> = Vec::new();
    for invoice in items {
        let name = invoice
            .client_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_GROUP.to_string());
        match groups.iter_mut().find(|(group, _)| *group == name) {
            Some((_, sum)) => *sum += coerced_amount(invoice),
            None => groups.push((name, coerced_amount(invoice))),
        }
    }
    let mut ranked = groups;
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let top_clients = ranked
        .iter()
        .take(TOP_CLIENTS)
        .map(|(client, amount)| ClientRevenue {
            client: client.clone(),
            amount: *amount,
        })
        .collect();

    let top3_sum: f64 = ranked
        .iter()
        .take(CONCENTRATION_GROUPS)
        .map(|(_, amount)| amount)
        .sum();
    let top3_share_pct = if total_amount > 0.0 {
        round_pct(top3_sum / total_amount * 100.0)
    } else {
        0
    };

    let avg_invoice_value = if total_invoices > 0 {
        round_pct(total_amount / total_invoices as f64)
    } else {
        0
    };

    AnalyticsReport {
        total_invoices,
        paid_count,
        unpaid_count,
        total_amount,
        paid_amount,
        unpaid_amount,
        highest: highest.cloned(),
        lowest: lowest.cloned(),
        monthly_totals,
        mom_delta_pct,
        top_clients,
        top3_share_pct,
        avg_invoice_value,
        histogram: histogram(items),
        monthly_paid_unpaid: trailing_paid_unpaid(items, today),
    }
}

/// Amounts bucketed by the record's (year, month); undated records fall
/// into an `Unknown` bucket that always sorts last.
fn monthly_totals(items: &[InvoiceWithClient]) -> Vec<MonthlyTotal> {
    let mut known: std::collections::BTreeMap<String, f64> = std::collections::BTreeMap::new();
    let mut unknown: Option<f64> = None;

    for invoice in items {
        let amount = coerced_amount(invoice);
        match invoice.date {
            Some(date) => *known.entry(month_key(date)).or_insert(0.0) += amount,
            None => *unknown.get_or_insert(0.0) += amount,
        }
    }

    let mut series: Vec<MonthlyTotal> = known
        .into_iter()
        .map(|(month, amount)| MonthlyTotal { month, amount })
        .collect();
    if let Some(amount) = unknown {
        series.push(MonthlyTotal {
            month: UNKNOWN_GROUP.to_string(),
            amount,
        });
    }
    series
}

/// Percent change between the two most recent known months. A zero prior
/// month is defined as +100 when the latest is positive, else 0.
fn month_over_month_delta(series: &[MonthlyTotal]) -> i64 {
    let known: Vec<f64> = series
        .iter()
        .filter(|bucket| bucket.month != UNKNOWN_GROUP)
        .map(|bucket| bucket.amount)
        .collect();

    let last = known.last().copied().unwrap_or(0.0);
    let prev = if known.len() >= 2 {
        known[known.len() - 2]
    } else {
        0.0
    };

    if prev > 0.0 {
        round_pct((last - prev) / prev * 100.0)
    } else if last > 0.0 {
        100
    } else {
        0
    }
}

/// Eight equal-width bins over the observed [min, max]; the maximum lands
/// in the last bin. Identical amounts collapse to a single bin.
fn histogram(items: &[InvoiceWithClient]) -> Vec<HistogramBin> {
    let amounts: Vec<f64> = items.iter().map(coerced_amount).collect();
    if amounts.is_empty() {
        return Vec::new();
    }

    let min = amounts.iter().copied().fold(f64::INFINITY, f64::min);
    let max = amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        return vec![HistogramBin {
            low: min,
            high: max,
            count: amounts.len(),
        }];
    }

    let step = (max - min) / HISTOGRAM_BINS as f64;
    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for amount in &amounts {
        let mut index = ((amount - min) / step).floor() as usize;
        if index >= HISTOGRAM_BINS {
            index = HISTOGRAM_BINS - 1;
        }
        counts[index] += 1;
    }

    counts
        .iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            low: min + step * i as f64,
            high: min + step * (i + 1) as f64,
            count: *count,
        })
        .collect()
}

/// Paid vs unpaid amounts for the twelve months ending at `today`, for the
/// stacked dashboard chart. Undated records and records outside the window
/// are skipped.
fn trailing_paid_unpaid(items: &[InvoiceWithClient], today: NaiveDate) -> Vec<MonthlyPaidUnpaid> {
    let mut cursor = (today.year(), today.month());
    let mut keys = Vec::with_capacity(STACKED_MONTHS);
    for _ in 0..STACKED_MONTHS {
        keys.push(format!("{:04}-{:02}", cursor.0, cursor.1));
        cursor = if cursor.1 == 1 {
            (cursor.0 - 1, 12)
        } else {
            (cursor.0, cursor.1 - 1)
        };
    }
    keys.reverse();

    let mut series: Vec<MonthlyPaidUnpaid> = keys
        .into_iter()
        .map(|month| MonthlyPaidUnpaid {
            month,
            paid: 0.0,
            unpaid: 0.0,
        })
        .collect();

    for invoice in items {
        let Some(date) = invoice.date else { continue };
        let key = month_key(date);
        if let Some(slot) = series.iter_mut().find(|slot| slot.month == key) {
            if invoice.is_paid {
                slot.paid += coerced_amount(invoice);
            } else {
                slot.unpaid += coerced_amount(invoice);
            }
        }
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(
        number: &str,
        amount: f64,
        is_paid: bool,
        date: Option<&str>,
        client: Option<&str>,
    ) -> InvoiceWithClient {
        InvoiceWithClient {
            id: format!("inv-{}", number),
            fy_year: "2024-25".to_string(),
            client_id: client.map(|c| format!("client-{}", c)),
            client_name: client.map(str::to_string),
            name: format!("Invoice {}", number),
            date: date.map(|d| d.parse().unwrap()),
            number: number.to_string(),
            amount,
            description: String::new(),
            is_paid,
            payment_date: None,
            pdf_url: "https://docs.example.com/a.pdf".to_string(),
            created_at: chrono::NaiveDateTime::default(),
        }
    }

    fn day(raw: &str) -> NaiveDate {
        raw.parse().unwrap()
    }

    #[test]
    fn empty_input_yields_zeroes_and_no_buckets() {
        let report = report(&[], day("2024-06-01"));
        assert_eq!(report.total_invoices, 0);
        assert_eq!(report.paid_count, 0);
        assert_eq!(report.unpaid_count, 0);
        assert_eq!(report.total_amount, 0.0);
        assert_eq!(report.paid_amount, 0.0);
        assert_eq!(report.unpaid_amount, 0.0);
        assert!(report.highest.is_none());
        assert!(report.lowest.is_none());
        assert!(report.monthly_totals.is_empty());
        assert_eq!(report.mom_delta_pct, 0);
        assert!(report.top_clients.is_empty());
        assert_eq!(report.top3_share_pct, 0);
        assert_eq!(report.avg_invoice_value, 0);
        assert!(report.histogram.is_empty());
    }

    #[test]
    fn two_invoice_scenario() {
        let items = [
            invoice("1", 100.0, true, Some("2024-01-15"), None),
            invoice("2", 50.0, false, Some("2024-02-10"), None),
        ];
        let report = report(&items, day("2024-02-20"));

        assert_eq!(report.total_invoices, 2);
        assert_eq!(report.paid_count, 1);
        assert_eq!(report.unpaid_count, 1);
        assert_eq!(report.total_amount, 150.0);
        assert_eq!(report.paid_amount, 100.0);
        assert_eq!(report.unpaid_amount, 50.0);
        assert_eq!(report.avg_invoice_value, 75);
        assert_eq!(
            report.monthly_totals,
            vec![
                MonthlyTotal {
                    month: "2024-01".to_string(),
                    amount: 100.0
                },
                MonthlyTotal {
                    month: "2024-02".to_string(),
                    amount: 50.0
                },
            ]
        );
        assert_eq!(report.mom_delta_pct, -50);
    }

    #[test]
    fn paid_and_unpaid_sums_and_counts_partition_totals() {
        let items = [
            invoice("1", 10.0, true, Some("2024-01-01"), Some("A")),
            invoice("2", 20.5, false, None, Some("B")),
            invoice("3", f64::NAN, false, Some("2024-03-01"), None),
            invoice("4", 0.0, true, Some("2024-03-09"), Some("A")),
            invoice("5", 99.5, false, Some("2024-04-01"), Some("C")),
        ];
        let report = report(&items, day("2024-06-01"));

        assert_eq!(report.paid_count + report.unpaid_count, report.total_invoices);
        assert_eq!(
            report.paid_amount + report.unpaid_amount,
            report.total_amount
        );
        // NaN coerced to zero, not propagated.
        assert_eq!(report.total_amount, 130.0);
    }

    #[test]
    fn partition_holds_exactly_for_non_representable_decimals() {
        // Summed in one pass, 0.1 + 0.2 + 0.4 != (0.1 + 0.4) + 0.2 in f64;
        // the total must be derived from the partitions so equality is exact.
        let items = [
            invoice("1", 0.1, true, None, None),
            invoice("2", 0.2, false, None, None),
            invoice("3", 0.4, true, None, None),
        ];
        let report = report(&items, day("2024-06-01"));

        assert_eq!(
            report.paid_amount + report.unpaid_amount,
            report.total_amount
        );
        assert_eq!(report.paid_amount, 0.5);
        assert_eq!(report.unpaid_amount, 0.2);
    }

    #[test]
    fn extreme_ties_keep_first_occurrence() {
        let items = [
            invoice("first-high", 100.0, true, None, None),
            invoice("second-high", 100.0, false, None, None),
            invoice("first-low", 1.0, false, None, None),
            invoice("second-low", 1.0, true, None, None),
        ];
        let report = report(&items, day("2024-06-01"));

        assert_eq!(report.highest.unwrap().number, "first-high");
        assert_eq!(report.lowest.unwrap().number, "first-low");
    }

    #[test]
    fn undated_records_bucket_as_unknown_sorted_last() {
        let items = [
            invoice("1", 5.0, true, None, None),
            invoice("2", 10.0, true, Some("2024-03-01"), None),
            invoice("3", 7.0, false, None, None),
            invoice("4", 1.0, false, Some("2023-12-31"), None),
        ];
        let report = report(&items, day("2024-06-01"));

        assert_eq!(
            report.monthly_totals,
            vec![
                MonthlyTotal {
                    month: "2023-12".to_string(),
                    amount: 1.0
                },
                MonthlyTotal {
                    month: "2024-03".to_string(),
                    amount: 10.0
                },
                MonthlyTotal {
                    month: "Unknown".to_string(),
                    amount: 12.0
                },
            ]
        );
        // Unknown never feeds the month-over-month delta.
        assert_eq!(report.mom_delta_pct, 900);
    }

    #[test]
    fn zero_prior_month_delta_rules() {
        let positive = [
            invoice("1", 0.0, true, Some("2024-01-01"), None),
            invoice("2", 40.0, true, Some("2024-02-01"), None),
        ];
        assert_eq!(report(&positive, day("2024-06-01")).mom_delta_pct, 100);

        let flat = [
            invoice("1", 0.0, true, Some("2024-01-01"), None),
            invoice("2", 0.0, true, Some("2024-02-01"), None),
        ];
        assert_eq!(report(&flat, day("2024-06-01")).mom_delta_pct, 0);

        let single = [invoice("1", 40.0, true, Some("2024-02-01"), None)];
        assert_eq!(report(&single, day("2024-06-01")).mom_delta_pct, 100);
    }

    #[test]
    fn top_clients_rank_groups_and_cap_at_five() {
        let items = [
            invoice("1", 10.0, true, None, Some("A")),
            invoice("2", 10.0, true, None, Some("B")),
            invoice("3", 30.0, true, None, Some("C")),
            invoice("4", 5.0, true, None, Some("D")),
            invoice("5", 4.0, true, None, Some("E")),
            invoice("6", 3.0, true, None, Some("F")),
            invoice("7", 2.0, true, None, None),
        ];
        let report = report(&items, day("2024-06-01"));

        assert_eq!(report.top_clients.len(), 5);
        assert_eq!(report.top_clients[0].client, "C");
        // A and B tie at 10; A was encountered first.
        assert_eq!(report.top_clients[1].client, "A");
        assert_eq!(report.top_clients[2].client, "B");
        assert!(report
            .top_clients
            .iter()
            .all(|entry| entry.client != "F" && entry.client != "Unknown"));
    }

    #[test]
    fn unresolved_clients_group_under_unknown() {
        let items = [
            invoice("1", 10.0, true, None, None),
            invoice("2", 15.0, false, None, None),
        ];
        let report = report(&items, day("2024-06-01"));
        assert_eq!(report.top_clients.len(), 1);
        assert_eq!(report.top_clients[0].client, "Unknown");
        assert_eq!(report.top_clients[0].amount, 25.0);
    }

    #[test]
    fn concentration_is_top_three_share() {
        let items = [
            invoice("1", 50.0, true, None, Some("A")),
            invoice("2", 25.0, true, None, Some("B")),
            invoice("3", 15.0, true, None, Some("C")),
            invoice("4", 10.0, true, None, Some("D")),
        ];
        let report = report(&items, day("2024-06-01"));
        assert_eq!(report.top3_share_pct, 90);
    }

    #[test]
    fn average_rounds_half_away_from_zero() {
        let items = [
            invoice("1", 2.0, true, None, None),
            invoice("2", 3.0, true, None, None),
        ];
        // 5 / 2 = 2.5 rounds to 3.
        assert_eq!(report(&items, day("2024-06-01")).avg_invoice_value, 3);
    }

    #[test]
    fn histogram_places_max_in_last_bin() {
        let items: Vec<InvoiceWithClient> = (0..=8)
            .map(|i| invoice(&i.to_string(), i as f64 * 10.0, true, None, None))
            .collect();
        let report = report(&items, day("2024-06-01"));

        assert_eq!(report.histogram.len(), 8);
        let total: usize = report.histogram.iter().map(|bin| bin.count).sum();
        assert_eq!(total, items.len());
        // 80.0 is the max and must land in the final bin, not fall off.
        assert_eq!(report.histogram[7].count, 2);
        assert_eq!(report.histogram[0].low, 0.0);
        assert_eq!(report.histogram[7].high, 80.0);
    }

    #[test]
    fn identical_amounts_collapse_to_one_bin() {
        let items = [
            invoice("1", 42.0, true, None, None),
            invoice("2", 42.0, false, None, None),
            invoice("3", 42.0, true, None, None),
        ];
        let report = report(&items, day("2024-06-01"));
        assert_eq!(
            report.histogram,
            vec![HistogramBin {
                low: 42.0,
                high: 42.0,
                count: 3
            }]
        );
    }

    #[test]
    fn trailing_series_covers_twelve_months_anchored_at_today() {
        let items = [
            invoice("1", 100.0, true, Some("2024-06-15"), None),
            invoice("2", 50.0, false, Some("2024-05-10"), None),
            invoice("3", 25.0, true, Some("2022-01-01"), None), // outside window
            invoice("4", 10.0, true, None, None),               // undated
        ];
        let report = report(&items, day("2024-06-20"));
        let series = &report.monthly_paid_unpaid;

        assert_eq!(series.len(), 12);
        assert_eq!(series[0].month, "2023-07");
        assert_eq!(series[11].month, "2024-06");
        assert_eq!(series[11].paid, 100.0);
        assert_eq!(series[10].unpaid, 50.0);
        let window_total: f64 = series.iter().map(|s| s.paid + s.unpaid).sum();
        assert_eq!(window_total, 150.0);
    }
}
