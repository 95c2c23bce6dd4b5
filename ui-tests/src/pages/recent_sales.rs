//! Page object for the Recent Sales list at `/salesdata/`.

use anyhow::{Context, Result, bail};
use derive_more::Display;
use fantoccini::Locator;
use fantoccini::elements::Element;
use jiff::civil::Date;
use tracing::debug;

use crate::framework::TestEnvironment;
use crate::helpers::{
    parse_invoice_date, parse_total_record_count, xpath_has_classes,
    xpath_literal,
};

pub const PATH: &str = "/salesdata/";

/// Empty option of the program select.
pub const NO_PROGRAM: &str = "---------";

const RECORD_COUNT_XPATH: &str =
    "//p[contains(normalize-space(.), 'Total Record Count')]";

/// Links to single records, whose text is the numeric record id.
const RECORD_LINKS_XPATH: &str = "//a[starts-with(@href, '/salesdata/') \
     and string-length(normalize-space(.)) > 0 \
     and translate(normalize-space(.), '0123456789', '') = '']";

const ADVANCED_SEARCH_TOGGLE: &str = "span.d-inline-flex.align-items-center\
     [data-bs-toggle='collapse'][href='#advanced_search_form']\
     [aria-controls='advanced_search_form']";

const CLEAR_FILTERS_LINK: &str =
    r#"a#clear-filters-btn.btn.btn-secondary[href="/salesdata/"]"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Filter {
    #[display("Market Actor")]
    MarketActor,
    Status,
    #[display("Invoice Date")]
    InvoiceDate,
    #[display("Assigned Program")]
    Program,
    #[display("Dismissed Date")]
    DismissedDate,
    #[display("Exported Date")]
    ExportedDate,
    #[display("Product Type")]
    ProductType,
}

impl Filter {
    fn locator(self) -> Locator<'static> {
        match self {
            Filter::MarketActor => Locator::Css("#id_market_actor"),
            Filter::Status => Locator::Css("#id_status"),
            Filter::InvoiceDate => Locator::Css("#id_invoice_date"),
            Filter::Program => Locator::Css("#id_program"),
            Filter::DismissedDate => Locator::Css("#id_dismissed_date"),
            Filter::ExportedDate => Locator::Css("#id_exported_date"),
            // The product type select has no stable id.
            Filter::ProductType => {
                Locator::XPath("//select[option[@value='QA Test Item']]")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TextField {
    Manufacturer,
    Model,
    #[display("Source ID")]
    SourceId,
    #[display("Invoice Number")]
    InvoiceNumber,
}

impl TextField {
    pub const ALL: [TextField; 4] = [
        TextField::InvoiceNumber,
        TextField::Manufacturer,
        TextField::Model,
        TextField::SourceId,
    ];

    fn selector(self) -> &'static str {
        match self {
            TextField::Manufacturer => "#id_manufacturer",
            TextField::Model => "#id_model",
            TextField::SourceId => "#id_source_id",
            TextField::InvoiceNumber => "#id_invoice_number",
        }
    }

    /// Results column showing the value this field filters on.
    pub fn column(self) -> Column {
        match self {
            TextField::Manufacturer => Column::Manufacturer,
            TextField::Model => Column::Model,
            TextField::SourceId => Column::SourceId,
            TextField::InvoiceNumber => Column::InvoiceNumber,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Column {
    Status,
    #[display("Market actor")]
    MarketActor,
    #[display("Invoice date")]
    InvoiceDate,
    Manufacturer,
    Model,
    #[display("Source ID")]
    SourceId,
    #[display("Invoice number")]
    InvoiceNumber,
}

impl Column {
    /// Cell classes differ between table versions, so every known variant
    /// is listed.
    pub fn cell_css(self) -> &'static str {
        match self {
            Column::Status => "td.status",
            Column::MarketActor => "td.market_actor",
            Column::InvoiceDate => {
                "td.invoice_date, td.invoice-date, td.invoiceDate"
            }
            Column::Manufacturer => "td.manufacturer, td.manufacturer_name",
            Column::Model => {
                "td.model, td.distributor_model, td.distributor-model"
            }
            Column::SourceId => {
                "td.source_id, td.source-id, td.iris_source_id, td.iris-source-id"
            }
            Column::InvoiceNumber => "td.invoice_number, td.invoice-number",
        }
    }

    fn header_text(self) -> &'static str {
        match self {
            Column::Status => "Status",
            Column::MarketActor => "Market actor",
            Column::InvoiceDate => "Invoice date",
            Column::Manufacturer => "Manufacturer",
            Column::Model => "Distributor Model",
            Column::SourceId => "Iris Source ID",
            Column::InvoiceNumber => "Invoice number",
        }
    }

    fn header_fallbacks(self) -> &'static [&'static str] {
        match self {
            Column::Status => &["a[href*='sort=status']"],
            Column::MarketActor => &["a[href*='sort=market_actor']"],
            Column::InvoiceDate => &[
                "th a[href*='sort=invoice_date']",
                "th a[href*='sort=-invoice_date']",
            ],
            Column::Manufacturer => &["a[href*='sort=manufacturer_name']"],
            Column::Model => &["a[href*='sort=model']"],
            Column::SourceId => &["a[href*='sort=source_id']"],
            Column::InvoiceNumber => &["a[href*='sort=-invoice_number']"],
        }
    }
}

pub struct RecentSalesPage<'a> {
    env: &'a TestEnvironment,
}

impl<'a> RecentSalesPage<'a> {
    pub async fn open(env: &'a TestEnvironment) -> Result<Self> {
        env.goto(PATH).await?;
        Self::attach(env).await
    }

    /// Use the page the browser is already on, e.g. after following a
    /// dashboard link.
    pub async fn attach(env: &'a TestEnvironment) -> Result<Self> {
        let current_url = env.current_url().await?;
        if !current_url.contains(PATH) {
            bail!("Failed to load the Recent Sales page. Current URL: {}", current_url);
        }
        env.wait_for(Filter::MarketActor.locator()).await?;
        Ok(RecentSalesPage { env })
    }

    // === Select filters ===

    pub async fn select(&self, filter: Filter) -> Result<Element> {
        self.env
            .wait_for(filter.locator())
            .await
            .with_context(|| format!("{} select not found", filter))
    }

    pub async fn select_label(&self, filter: Filter, label: &str) -> Result<()> {
        let select = self.select(filter).await?;
        self.env.highlight(&select).await?;
        let xpath = format!(".//option[normalize-space(.)={}]", xpath_literal(label));
        let option = select
            .find(Locator::XPath(&xpath))
            .await
            .with_context(|| format!("{} has no option {:?}", filter, label))?;
        option.click().await?;

        let selected = self.selected_label(filter).await?;
        if selected != label {
            bail!("{} should be {:?} but is {:?}", filter, label, selected);
        }
        debug!("{} set to {:?}", filter, label);
        Ok(())
    }

    pub async fn select_value(&self, filter: Filter, value: &str) -> Result<()> {
        let select = self.select(filter).await?;
        select
            .select_by_value(value)
            .await
            .with_context(|| format!("{} has no option with value {:?}", filter, value))?;
        Ok(())
    }

    pub async fn selected_label(&self, filter: Filter) -> Result<String> {
        let select = self.select(filter).await?;
        let option = select.find(Locator::Css("option:checked")).await?;
        Ok(option.text().await?.trim().to_string())
    }

    pub async fn selected_value(&self, filter: Filter) -> Result<String> {
        let select = self.select(filter).await?;
        Ok(select.prop("value").await?.unwrap_or_default().trim().to_string())
    }

    /// Blank a select that has no empty option, the way a script would.
    pub async fn reset_select(&self, filter: Filter) -> Result<()> {
        let select = self.select(filter).await?;
        self.env
            .browser
            .execute(
                "arguments[0].value = '';\
                 arguments[0].dispatchEvent(new Event('input', {bubbles: true}));\
                 arguments[0].dispatchEvent(new Event('change', {bubbles: true}));",
                vec![serde_json::to_value(&select)?],
            )
            .await?;
        Ok(())
    }

    pub async fn option_labels(&self, filter: Filter) -> Result<Vec<String>> {
        let select = self.select(filter).await?;
        let mut labels = Vec::new();
        for option in select.find_all(Locator::Css("option")).await? {
            labels.push(option.text().await?.trim().to_string());
        }
        Ok(labels)
    }

    pub async fn option_values(&self, filter: Filter) -> Result<Vec<String>> {
        let select = self.select(filter).await?;
        let mut values = Vec::new();
        for option in select.find_all(Locator::Css("option")).await? {
            values.push(option.attr("value").await?.unwrap_or_default());
        }
        Ok(values)
    }

    /// Select `label` unless it is already selected.
    pub async fn ensure_label(&self, filter: Filter, label: &str) -> Result<()> {
        if self.selected_label(filter).await? != label {
            self.select_label(filter, label).await?;
        }
        Ok(())
    }

    // === Text filters ===

    pub async fn input(&self, field: TextField) -> Result<Element> {
        self.env
            .wait_for(Locator::Css(field.selector()))
            .await
            .with_context(|| format!("{} input not found", field))
    }

    pub async fn fill(&self, field: TextField, value: &str) -> Result<()> {
        let input = self.input(field).await?;
        self.env.highlight(&input).await?;
        input.clear().await?;
        if !value.is_empty() {
            input.send_keys(value).await?;
        }
        Ok(())
    }

    pub async fn input_value(&self, field: TextField) -> Result<String> {
        let input = self.input(field).await?;
        Ok(input.prop("value").await?.unwrap_or_default())
    }

    pub async fn input_type(&self, field: TextField) -> Result<String> {
        let input = self.input(field).await?;
        Ok(input.attr("type").await?.unwrap_or_default())
    }

    // === Search ===

    pub async fn search_button(&self) -> Result<Element> {
        let xpath = format!(
            "//button[@type='submit' and {} and contains(normalize-space(.), 'Search')]",
            xpath_has_classes(&["btn", "btn-primary"])
        );
        self.env.wait_for(Locator::XPath(&xpath)).await
    }

    pub async fn search(&self) -> Result<()> {
        let button = self.search_button().await?;
        self.env.highlight(&button).await?;
        button.click().await?;
        self.env.pause().await;
        Ok(())
    }

    /// Wait until the table shows a row for `column` or the page reports an
    /// empty result.
    pub async fn wait_for_results(&self, column: Column) -> Result<()> {
        let page = self;
        self.env
            .poll_until(
                &format!("a {} cell or 'Total Record Count 0'", column),
                self.env.config.wait_timeout,
                move || async move {
                    Ok(page.has_cells(column).await.unwrap_or(false)
                        || page.shows_empty_result().await.unwrap_or(false))
                },
            )
            .await
    }

    /// Like `wait_for_results`, keyed on record id links instead of a column.
    pub async fn wait_for_record_links(&self) -> Result<()> {
        let page = self;
        self.env
            .poll_until(
                "a record link or 'Total Record Count 0'",
                self.env.config.wait_timeout,
                move || async move {
                    Ok(page.has_record_links().await.unwrap_or(false)
                        || page.shows_empty_result().await.unwrap_or(false))
                },
            )
            .await
    }

    /// Fill one text filter, search and return the resulting record count.
    pub async fn search_by(
        &self,
        field: TextField,
        value: &str,
        column: Column,
    ) -> Result<u64> {
        debug!("Searching with {} = {:?}", field, value);
        self.fill(field, value).await?;
        self.search().await?;
        self.wait_for_results(column).await.with_context(|| {
            format!(
                "No {} row and no 'Total Record Count 0' after searching {} = {:?}",
                column, field, value
            )
        })?;
        self.total_record_count().await
    }

    pub async fn count_paragraph(&self) -> Result<Element> {
        self.env.wait_for(Locator::XPath(RECORD_COUNT_XPATH)).await
    }

    pub async fn count_text(&self) -> Result<String> {
        let paragraph = self.count_paragraph().await?;
        Ok(paragraph.text().await?.trim().to_string())
    }

    pub async fn total_record_count(&self) -> Result<u64> {
        let text = self.count_text().await?;
        let count = parse_total_record_count(&text)?;
        debug!("Total Record Count = {}", count);
        Ok(count)
    }

    async fn shows_empty_result(&self) -> Result<bool> {
        let paragraphs = self
            .env
            .browser
            .find_all(Locator::XPath(RECORD_COUNT_XPATH))
            .await?;
        let Some(paragraph) = paragraphs.first() else {
            return Ok(false);
        };
        let text = paragraph.text().await?;
        Ok(parse_total_record_count(&text).ok() == Some(0))
    }

    pub async fn record_links(&self) -> Result<Vec<Element>> {
        Ok(self
            .env
            .browser
            .find_all(Locator::XPath(RECORD_LINKS_XPATH))
            .await?)
    }

    pub async fn has_record_links(&self) -> Result<bool> {
        Ok(!self.record_links().await?.is_empty())
    }

    // === Results table ===

    pub async fn cells(&self, column: Column) -> Result<Vec<Element>> {
        Ok(self
            .env
            .browser
            .find_all(Locator::Css(column.cell_css()))
            .await?)
    }

    async fn has_cells(&self, column: Column) -> Result<bool> {
        Ok(!self.cells(column).await?.is_empty())
    }

    pub async fn first_cell(&self, column: Column) -> Result<Element> {
        self.env
            .wait_for(Locator::Css(column.cell_css()))
            .await
            .with_context(|| format!("Expected at least one {} cell", column))
    }

    pub async fn first_cell_text(&self, column: Column) -> Result<String> {
        let cell = self.first_cell(column).await?;
        self.env.highlight(&cell).await?;
        Ok(cell.text().await?.trim().to_string())
    }

    /// Trimmed texts of the first `limit` cells of `column`.
    pub async fn cell_texts(&self, column: Column, limit: usize) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for cell in self.cells(column).await?.into_iter().take(limit) {
            texts.push(cell.text().await?.trim().to_string());
        }
        Ok(texts)
    }

    pub async fn first_invoice_date(&self) -> Result<Date> {
        let text = self.first_cell_text(Column::InvoiceDate).await?;
        if text.is_empty() {
            bail!("Expected non-empty Invoice Date cell text");
        }
        Ok(parse_invoice_date(&text)?)
    }

    /// Help text of a status cell, empty when the cell has none.
    pub async fn status_help_text(&self, cell: &Element) -> Result<String> {
        let help = cell.find_all(Locator::Css("span.help-text")).await?;
        match help.first() {
            Some(span) => Ok(span.text().await?.trim().to_string()),
            None => Ok(String::new()),
        }
    }

    /// Sortable header link of a column, by exact link text first and then by
    /// its sort parameter.
    pub async fn sort_header(&self, column: Column) -> Result<Element> {
        if let Ok(link) = self
            .env
            .browser
            .find(Locator::LinkText(column.header_text()))
            .await
        {
            return Ok(link);
        }
        for selector in column.header_fallbacks() {
            let links = self.env.browser.find_all(Locator::Css(selector)).await?;
            if let Some(link) = links.into_iter().next() {
                return Ok(link);
            }
        }
        bail!(
            "Could not find the {} column header (by link text {:?} or {:?})",
            column,
            column.header_text(),
            column.header_fallbacks()
        )
    }

    /// Click the column header. The page reloads, so every call looks the
    /// header up again.
    pub async fn sort_by(&self, column: Column) -> Result<()> {
        let header = self.sort_header(column).await?;
        self.env.highlight(&header).await?;
        header.click().await?;
        self.env.pause().await;
        self.first_cell(column).await?;
        Ok(())
    }

    // === Invoice date range ===

    pub async fn date_range_checkbox(&self) -> Result<Element> {
        self.env
            .wait_for(Locator::Css("#enable-date-range-invoice"))
            .await
    }

    pub async fn date_range_enabled(&self) -> Result<bool> {
        Ok(self.date_range_checkbox().await?.is_selected().await?)
    }

    pub async fn set_date_range_enabled(&self, enabled: bool) -> Result<()> {
        let checkbox = self.date_range_checkbox().await?;
        if checkbox.is_selected().await? != enabled {
            self.env.highlight(&checkbox).await?;
            checkbox.click().await?;
        }
        if self.date_range_enabled().await? != enabled {
            bail!("Date range checkbox did not change to {}", enabled);
        }
        Ok(())
    }

    pub async fn invoice_start_input(&self) -> Result<Element> {
        self.env.wait_for(Locator::Css("#invoice_start_date")).await
    }

    pub async fn invoice_end_input(&self) -> Result<Element> {
        self.env.wait_for(Locator::Css("#invoice_end_date")).await
    }

    pub async fn set_invoice_start(&self, date: Date) -> Result<()> {
        let input = self.invoice_start_input().await?;
        self.set_date_input(&input, date).await
    }

    pub async fn set_invoice_end(&self, date: Date) -> Result<()> {
        let input = self.invoice_end_input().await?;
        self.set_date_input(&input, date).await
    }

    /// Date inputs take keyboard input in the browser locale, so the ISO
    /// value is assigned directly.
    async fn set_date_input(&self, input: &Element, date: Date) -> Result<()> {
        let iso = date.to_string();
        self.env.highlight(input).await?;
        self.env
            .browser
            .execute(
                "arguments[0].value = arguments[1];\
                 arguments[0].dispatchEvent(new Event('input', {bubbles: true}));\
                 arguments[0].dispatchEvent(new Event('change', {bubbles: true}));",
                vec![serde_json::to_value(input)?, serde_json::Value::String(iso.clone())],
            )
            .await?;
        let value = input.prop("value").await?.unwrap_or_default();
        if value != iso {
            bail!("Date input should hold {} but holds {:?}", iso, value);
        }
        Ok(())
    }

    // === Static controls ===

    pub async fn advanced_search_toggle(&self) -> Result<Element> {
        self.env.wait_for(Locator::Css(ADVANCED_SEARCH_TOGGLE)).await
    }

    pub async fn clear_filters_link(&self) -> Result<Element> {
        self.env.wait_for(Locator::Css(CLEAR_FILTERS_LINK)).await
    }

    pub async fn warning_alert(&self) -> Result<Element> {
        self.env.wait_for(Locator::Css("div.alert.alert-danger")).await
    }
}
