//! Page object for `/dashboard/`, one card per market actor.

use anyhow::{Context, Result, bail};
use fantoccini::Locator;
use fantoccini::elements::Element;
use std::collections::BTreeSet;
use tracing::debug;

use crate::framework::TestEnvironment;
use crate::helpers::{is_us_date, parse_counter, xpath_has_classes, xpath_literal};

pub const PATH: &str = "/dashboard/";

pub const SALES_RECORDS_SUMMARY: &str = "Sales Records Summary";

const RECENT_SALES_NAV_LINK: &str = r#"a.nav-link.ps-4[href="/salesdata/"]"#;

fn card_xpath() -> String {
    format!(
        "//div[{}][.//h2[{}]]",
        xpath_has_classes(&["card"]),
        xpath_has_classes(&["card-title"])
    )
}

/// Cards whose title already has text. Titles can render empty while the
/// card is still loading.
fn named_card_xpath() -> String {
    format!(
        "//div[{}][.//h2[{}][normalize-space(.) != '']]",
        xpath_has_classes(&["card"]),
        xpath_has_classes(&["card-title"])
    )
}

fn summary_label_xpath(label: &str) -> String {
    format!(
        ".//span[{}][normalize-space(.)={}]",
        xpath_has_classes(&["me-2", "card-link", "text-400"]),
        xpath_literal(label)
    )
}

fn tooltip_host_xpath() -> String {
    format!(
        ".//span[@data-bs-toggle='tooltip'][.//i[{}]]",
        xpath_has_classes(&["bi", "bi-info-circle"])
    )
}

pub struct DashboardPage<'a> {
    env: &'a TestEnvironment,
}

pub struct MarketActorCard {
    pub element: Element,
    pub name: String,
}

/// Value and date of the "Last Ingest" summary widget.
pub struct LastIngest {
    pub value: String,
    pub ingested_on: String,
}

pub struct ProgramRow {
    pub element: Element,
    pub tooltip: String,
}

impl<'a> DashboardPage<'a> {
    pub async fn open(env: &'a TestEnvironment) -> Result<Self> {
        env.goto(PATH).await?;
        let current_url = env.current_url().await?;
        if !current_url.ends_with(PATH) {
            bail!("Failed to load the Dashboard page. Current URL: {}", current_url);
        }
        Ok(DashboardPage { env })
    }

    /// First card with a visible name.
    pub async fn first_card(&self) -> Result<MarketActorCard> {
        let element = self
            .env
            .wait_for(Locator::XPath(&named_card_xpath()))
            .await
            .context("No named market actor card on the dashboard")?;
        let card = MarketActorCard::from_element(element).await?;
        if card.name.is_empty() {
            bail!("Expected the first Market Actor card to have a visible name");
        }
        Ok(card)
    }

    async fn wait_for_cards(&self) -> Result<()> {
        self.env
            .wait_for(Locator::XPath(&card_xpath()))
            .await
            .context("No market actor card on the dashboard")?;
        Ok(())
    }

    /// Every card on the page, named or not.
    pub async fn cards(&self) -> Result<Vec<MarketActorCard>> {
        self.wait_for_cards().await?;
        let mut cards = Vec::new();
        for element in self
            .env
            .browser
            .find_all(Locator::XPath(&card_xpath()))
            .await?
        {
            cards.push(MarketActorCard::from_element(element).await?);
        }
        Ok(cards)
    }

    pub async fn card_names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for title in self
            .env
            .browser
            .find_all(Locator::Css("h2.card-title"))
            .await?
        {
            let name = title.text().await?.trim().to_string();
            if !name.is_empty() {
                names.insert(name);
            }
        }
        Ok(names)
    }

    /// Cards can render lazily, so keep scrolling until the set of names
    /// stops growing.
    pub async fn collect_card_names_with_scroll(
        &self,
        max_rounds: usize,
        stable_rounds: usize,
        scroll_by: i64,
    ) -> Result<BTreeSet<String>> {
        self.wait_for_cards().await?;
        let mut names = BTreeSet::new();
        let mut stable = 0;
        for round in 1..=max_rounds {
            let before = names.len();
            names.extend(self.card_names().await?);
            debug!("Round {}: {} market actor cards", round, names.len());

            if names.len() == before {
                stable += 1;
                if stable >= stable_rounds {
                    break;
                }
            } else {
                stable = 0;
            }

            self.env
                .browser
                .execute(
                    "window.scrollBy(0, arguments[0]);",
                    vec![serde_json::json!(scroll_by)],
                )
                .await?;
            self.env.pause().await;
        }
        Ok(names)
    }

    pub async fn recent_sales_nav_link(&self) -> Result<Element> {
        self.env.wait_for(Locator::Css(RECENT_SALES_NAV_LINK)).await
    }
}

impl MarketActorCard {
    async fn from_element(element: Element) -> Result<Self> {
        let title = element.find(Locator::Css("h2.card-title")).await?;
        let name = title.text().await?.trim().to_string();
        Ok(MarketActorCard { element, name })
    }

    pub async fn title(&self) -> Result<Element> {
        Ok(self.element.find(Locator::Css("h2.card-title")).await?)
    }

    /// Collapsible body of the card.
    pub async fn panel(&self) -> Result<Element> {
        self.element
            .find(Locator::Css(".accordion-collapse, .collapse, .card-body"))
            .await
            .with_context(|| {
                format!("Card {:?} has no collapsible content panel", self.name)
            })
    }

    pub async fn summary_title(&self) -> Result<Element> {
        let xpath = format!(
            ".//h3[{}][normalize-space(.)={}]",
            xpath_has_classes(&["card-title", "rose-primary-text"]),
            xpath_literal(SALES_RECORDS_SUMMARY)
        );
        self.element.find(Locator::XPath(&xpath)).await.with_context(|| {
            format!("Card {:?} has no {} section", self.name, SALES_RECORDS_SUMMARY)
        })
    }

    pub async fn summary_label(&self, label: &str) -> Result<Element> {
        self.element
            .find(Locator::XPath(&summary_label_xpath(label)))
            .await
            .with_context(|| format!("Card {:?} has no {:?} widget", self.name, label))
    }

    /// Flex row holding the label and its info tooltip.
    pub async fn summary_row(&self, label: &str) -> Result<Element> {
        let label_el = self.summary_label(label).await?;
        let xpath = format!(
            "ancestor::div[{}][1]",
            xpath_has_classes(&["d-flex", "flex-row"])
        );
        label_el
            .find(Locator::XPath(&xpath))
            .await
            .with_context(|| format!("No row around the {:?} widget", label))
    }

    /// Counter link of a summary widget. The widget is the closest container
    /// of the label that holds a link with every fragment in its href.
    pub async fn summary_link(
        &self,
        label: &str,
        href_fragments: &[&str],
    ) -> Result<Element> {
        let label_el = self.summary_label(label).await?;
        let mut conditions = vec!["starts-with(@href, '/salesdata/')".to_string()];
        conditions.extend(
            href_fragments
                .iter()
                .map(|fragment| format!("contains(@href, {})", xpath_literal(fragment))),
        );
        let link = format!("a[{}]", conditions.join(" and "));
        let xpath = format!("ancestor::div[.//{link}][1]//{link}");
        label_el.find(Locator::XPath(&xpath)).await.with_context(|| {
            format!(
                "No link with {:?} in the {:?} widget of {:?}",
                href_fragments, label, self.name
            )
        })
    }

    pub async fn last_ingest(&self) -> Result<LastIngest> {
        let label_el = self.summary_label("Last Ingest").await?;
        let ingested_on = "p[contains(@class, 'card-text') and contains(., 'Ingested on')]";
        let widget = label_el
            .find(Locator::XPath(&format!(
                "ancestor::*[self::div or self::li][.//{ingested_on}][1]"
            )))
            .await
            .context("No Last Ingest widget with an 'Ingested on' line")?;

        let value_xpath = format!(
            ".//h3[not({})]",
            xpath_has_classes(&["card-title"])
        );
        let value = widget.find(Locator::XPath(&value_xpath)).await?;
        let date = widget
            .find(Locator::XPath(&format!(".//{ingested_on}//span")))
            .await?;

        Ok(LastIngest {
            value: value.text().await?.trim().to_string(),
            ingested_on: date.text().await?.trim().to_string(),
        })
    }

    /// Program widget titles in display order.
    pub async fn program_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for heading in self
            .element
            .find_all(Locator::Css("h5.rose-primary-text"))
            .await?
        {
            names.push(heading.text().await?.trim().to_string());
        }
        Ok(names)
    }

    pub async fn program_row(&self, label: &str) -> Result<ProgramRow> {
        let xpath = format!(
            ".//li[{}][contains(., {})]",
            xpath_has_classes(&["list-group-item"]),
            xpath_literal(label)
        );
        let element = self
            .element
            .find(Locator::XPath(&xpath))
            .await
            .with_context(|| format!("No program row {:?} in {:?}", label, self.name))?;
        let (_, tooltip) = tooltip_of(&element).await?;
        Ok(ProgramRow { element, tooltip })
    }
}

impl ProgramRow {
    pub async fn count(&self) -> Result<u64> {
        let value = self
            .element
            .find(Locator::Css("p.ms-auto.mb-0.rose-primary-text"))
            .await?;
        Ok(parse_counter(&value.text().await?)?)
    }

    pub async fn date(&self) -> Result<String> {
        let value = self.element.find(Locator::Css("span.fw-bold.ms-auto")).await?;
        let text = value.text().await?.trim().to_string();
        if !is_us_date(&text) {
            bail!("Expected a mm/dd/yyyy date, got {:?}", text);
        }
        Ok(text)
    }
}

/// Info tooltip inside `scope`: the host span and its `data-bs-title`.
pub async fn tooltip_of(scope: &Element) -> Result<(Element, String)> {
    let host = scope
        .find(Locator::XPath(&tooltip_host_xpath()))
        .await
        .context("No info tooltip found")?;
    let title = host.attr("data-bs-title").await?.unwrap_or_default();
    Ok((host, title.trim().to_string()))
}
