use anyhow::{Context, Result, ensure};
use tracing::{debug, info};

use crate::framework::TestEnvironment;
use crate::helpers::{is_us_date, parse_counter, parse_invoice_date};
use crate::pages::dashboard::{DashboardPage, MarketActorCard, SALES_RECORDS_SUMMARY, tooltip_of};
use crate::pages::recent_sales::{Column, Filter, RecentSalesPage};

/// A "Sales Records Summary" counter that links to a filtered Recent Sales
/// list.
struct CounterWidget {
    label: &'static str,
    tooltip: &'static str,
    href_fragments: &'static [&'static str],
    /// Query string of the Recent Sales URL the counter leads to.
    query: &'static str,
    /// Selected labels expected on Recent Sales besides the market actor.
    filters: &'static [(Filter, &'static str)],
}

const UNASSIGNED: CounterWidget = CounterWidget {
    label: "Unassigned",
    tooltip: "Records that did not match a program.",
    href_fragments: &["status=UNASSIGNED"],
    query: "status=UNASSIGNED&market_actor=0",
    filters: &[(Filter::Status, "Unassigned"), (Filter::InvoiceDate, "All")],
};

const DISMISSED_LAST_30_DAYS: CounterWidget = CounterWidget {
    label: "Dismissed Last 30 Days",
    tooltip: "Records that have been archived because they can\u{2019}t be completed or exported.",
    href_fragments: &["status=DISMISSED", "dismissed_date=30"],
    query: "status=DISMISSED&dismissed_date=30&market_actor=0",
    filters: &[
        (Filter::Status, "Dismissed"),
        (Filter::DismissedDate, "Last 30 Days"),
    ],
};

const EXPORTED_LAST_30_DAYS: CounterWidget = CounterWidget {
    label: "Exported Last 30 Days",
    tooltip: "Records that have been previously batched.",
    href_fragments: &["status=EXPORTED", "exported_date=30"],
    query: "status=EXPORTED&exported_date=30&market_actor=0",
    filters: &[
        (Filter::Status, "Exported"),
        (Filter::ExportedDate, "Last 30 Days"),
    ],
};

/// Unassigned widget of the first market actor card.
///
/// Steps:
/// - Open the dashboard and find the Sales Records Summary of the first card
/// - Verify the Unassigned tooltip and that the counter is a number
/// - Click the counter and verify the Recent Sales URL
/// - Verify Market Actor is the card, Status is Unassigned (UNASSIGNED) and
///   Invoice Date is All
/// - Verify Total Record Count equals the counter
#[tokio::test]
#[ignore = "requires TARGET_URL and a WebDriver"]
async fn test_unassigned_widget() -> Result<()> {
    let env = TestEnvironment::setup().await?;
    let outcome = counter_widget(&env, &UNASSIGNED).await;
    env.finish(concat!(module_path!(), "::test_unassigned_widget"), outcome)
        .await
}

/// Dismissed Last 30 Days widget. Same steps as the Unassigned widget, with
/// Status Dismissed and Dismissed Date Last 30 Days on Recent Sales.
#[tokio::test]
#[ignore = "requires TARGET_URL and a WebDriver"]
async fn test_dismissed_last_30_days_widget() -> Result<()> {
    let env = TestEnvironment::setup().await?;
    let outcome = counter_widget(&env, &DISMISSED_LAST_30_DAYS).await;
    env.finish(
        concat!(module_path!(), "::test_dismissed_last_30_days_widget"),
        outcome,
    )
    .await
}

/// Exported Last 30 Days widget. Same steps as the Unassigned widget, with
/// Status Exported and Exported Date Last 30 Days on Recent Sales.
#[tokio::test]
#[ignore = "requires TARGET_URL and a WebDriver"]
async fn test_exported_last_30_days_widget() -> Result<()> {
    let env = TestEnvironment::setup().await?;
    let outcome = counter_widget(&env, &EXPORTED_LAST_30_DAYS).await;
    env.finish(
        concat!(module_path!(), "::test_exported_last_30_days_widget"),
        outcome,
    )
    .await
}

/// Last Ingest widget.
///
/// Steps:
/// - Find the Sales Records Summary of the first card
/// - Verify the Last Ingest value is a non-negative integer
/// - Verify the "Ingested on" date is mm/dd/yyyy
#[tokio::test]
#[ignore = "requires TARGET_URL and a WebDriver"]
async fn test_last_ingest_widget() -> Result<()> {
    let env = TestEnvironment::setup().await?;
    let outcome = last_ingest(&env).await;
    env.finish(concat!(module_path!(), "::test_last_ingest_widget"), outcome)
        .await
}

/// Latest Invoice Date widget.
///
/// Steps:
/// - Verify the tooltip and find the date link of the first card
/// - Click it and verify the URL is the link's href
/// - Verify Market Actor, Status = All and the enabled date range
/// - Verify both date inputs hold the dates from the query string
/// - Sort by Invoice date and verify the first row is the start date
#[tokio::test]
#[ignore = "requires TARGET_URL and a WebDriver"]
async fn test_latest_invoice_date_widget() -> Result<()> {
    let env = TestEnvironment::setup().await?;
    let outcome = latest_invoice_date(&env).await;
    env.finish(
        concat!(module_path!(), "::test_latest_invoice_date_widget"),
        outcome,
    )
    .await
}

/// First card with its Sales Records Summary section in place.
async fn summary_card(env: &TestEnvironment) -> Result<MarketActorCard> {
    info!("🏠 Opening the dashboard");
    let page = DashboardPage::open(env).await?;
    let card = page.first_card().await?;
    info!("🏢 First market actor: {}", card.name);

    let title = card.summary_title().await?;
    let text = title.text().await?;
    ensure!(
        text.trim() == SALES_RECORDS_SUMMARY,
        "Expected the {:?} heading, found {:?}",
        SALES_RECORDS_SUMMARY,
        text
    );
    Ok(card)
}

async fn verify_tooltip(
    env: &TestEnvironment,
    card: &MarketActorCard,
    label: &str,
    expected: &str,
) -> Result<()> {
    let label_el = card.summary_label(label).await?;
    env.highlight(&label_el).await?;

    let row = card.summary_row(label).await?;
    let (host, tooltip) = tooltip_of(&row)
        .await
        .with_context(|| format!("No tooltip next to {:?}", label))?;
    env.highlight(&host).await?;
    ensure!(
        tooltip == expected,
        "{} tooltip should be {:?} but was {:?}",
        label,
        expected,
        tooltip
    );
    debug!("{} tooltip verified", label);
    Ok(())
}

/// Total Record Count on the list page, read the strict way: the text must
/// be the label followed by nothing but digits.
async fn strict_total_record_count(page: &RecentSalesPage<'_>) -> Result<u64> {
    let text = page.count_text().await?;
    let rest = text
        .strip_prefix("Total Record Count")
        .with_context(|| format!("Unexpected Total Record Count text: {:?}", text))?;
    parse_counter(rest)
        .with_context(|| format!("Total Record Count should end with an integer: {:?}", text))
}

async fn counter_widget(env: &TestEnvironment, widget: &CounterWidget) -> Result<()> {
    let card = summary_card(env).await?;

    info!("💬 Checking the {} tooltip", widget.label);
    verify_tooltip(env, &card, widget.label, widget.tooltip).await?;

    let link = card.summary_link(widget.label, widget.href_fragments).await?;
    env.highlight(&link).await?;
    let counter = parse_counter(&link.text().await?)?;
    info!("🔢 {} counter: {}", widget.label, counter);

    info!("👆 Following the counter");
    link.click().await?;
    env.pause().await;

    let expected_url = env.config.url(&format!("salesdata/?{}", widget.query));
    let current_url = env.current_url().await?;
    ensure!(
        current_url == expected_url,
        "Expected URL {:?}, but was {:?}",
        expected_url,
        current_url
    );

    let page = RecentSalesPage::attach(env).await?;
    let market_actor = page.selected_label(Filter::MarketActor).await?;
    ensure!(
        market_actor == card.name,
        "Market Actor should be {:?}, but was {:?}",
        card.name,
        market_actor
    );
    for &(filter, expected) in widget.filters {
        let selected = page.selected_label(filter).await?;
        ensure!(
            selected == expected,
            "{} should be {:?}, but was {:?}",
            filter,
            expected,
            selected
        );
    }
    if widget.href_fragments.contains(&"status=UNASSIGNED") {
        let value = page.selected_value(Filter::Status).await?;
        ensure!(
            value == "UNASSIGNED",
            "Status value should be 'UNASSIGNED', but was {:?}",
            value
        );
    }

    let total = strict_total_record_count(&page).await?;
    ensure!(
        total == counter,
        "Total Record Count should match the {} counter, but was {} and {}",
        widget.label,
        total,
        counter
    );

    info!("✅ {} widget matches Recent Sales", widget.label);
    Ok(())
}

async fn last_ingest(env: &TestEnvironment) -> Result<()> {
    let card = summary_card(env).await?;
    let label = card.summary_label("Last Ingest").await?;
    env.highlight(&label).await?;

    let widget = card.last_ingest().await?;
    let value = parse_counter(&widget.value)
        .context("Last Ingest value should be a non-negative integer")?;
    info!("📥 Last Ingest value: {}", value);

    ensure!(
        is_us_date(&widget.ingested_on),
        "Ingested on date should be formatted as mm/dd/yyyy, but was {:?}",
        widget.ingested_on
    );
    info!("✅ Ingested on {}", widget.ingested_on);
    Ok(())
}

async fn latest_invoice_date(env: &TestEnvironment) -> Result<()> {
    const LABEL: &str = "Latest Invoice Date";

    let card = summary_card(env).await?;
    info!("💬 Checking the {} tooltip", LABEL);
    verify_tooltip(env, &card, LABEL, "Date of latest sale received from N/A.").await?;

    let link = card
        .summary_link(
            LABEL,
            &[
                "enable_date_range=on",
                "invoice_start_date=",
                "invoice_end_date=",
                "market_actor=0",
            ],
        )
        .await?;
    env.highlight(&link).await?;
    let link_text = link.text().await?.trim().to_string();
    ensure!(!link_text.is_empty(), "{} link should display a date", LABEL);
    info!("📅 {}: {}", LABEL, link_text);

    // Read before clicking, the element is gone after navigation
    let href = link.attr("href").await?.unwrap_or_default();
    ensure!(!href.trim().is_empty(), "{} link has no href", LABEL);
    let expected_url = env.config.url(href.trim());

    info!("👆 Following the link");
    link.click().await?;
    env.pause().await;
    let current_url = env.current_url().await?;
    ensure!(
        current_url == expected_url,
        "Expected URL {:?}, but was {:?}",
        expected_url,
        current_url
    );

    let page = RecentSalesPage::attach(env).await?;
    let market_actor = page.selected_label(Filter::MarketActor).await?;
    ensure!(
        market_actor == card.name,
        "Market Actor should be {:?}, but was {:?}",
        card.name,
        market_actor
    );
    let status = page.selected_label(Filter::Status).await?;
    ensure!(status == "All", "Status should be 'All', but was {:?}", status);
    ensure!(
        page.date_range_enabled().await?,
        "Expected the specific date range to be enabled"
    );

    let url = env.browser.current_url().await?;
    let query_value = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    };
    let start = query_value("invoice_start_date");
    let end = query_value("invoice_end_date");
    ensure!(!start.is_empty(), "invoice_start_date missing from {}", url);
    ensure!(!end.is_empty(), "invoice_end_date missing from {}", url);

    let start_value = page
        .invoice_start_input()
        .await?
        .prop("value")
        .await?
        .unwrap_or_default();
    let end_value = page
        .invoice_end_input()
        .await?
        .prop("value")
        .await?
        .unwrap_or_default();
    ensure!(
        start_value.trim() == start,
        "Invoice Start Date should be {:?}, but was {:?}",
        start,
        start_value
    );
    ensure!(
        start_value.trim() == end,
        "Invoice Start Date should match Invoice End Date, but was {:?} vs {:?}",
        start_value,
        end
    );
    ensure!(
        end_value.trim() == end,
        "Invoice End Date should be {:?}, but was {:?}",
        end,
        end_value
    );
    // The link text is not always ISO formatted
    if link_text == start {
        ensure!(start_value.trim() == link_text && end_value.trim() == link_text);
    }

    info!("↕️ Sorting by Invoice date");
    page.sort_by(Column::InvoiceDate).await?;
    let first = page.first_cell_text(Column::InvoiceDate).await?;
    let first_date = parse_invoice_date(&first.replace('.', ""))?;
    ensure!(
        first_date.to_string() == start,
        "First row invoice date should be {:?}, but was {:?}",
        start,
        first_date.to_string()
    );

    info!("✅ {} widget matches Recent Sales", LABEL);
    Ok(())
}
