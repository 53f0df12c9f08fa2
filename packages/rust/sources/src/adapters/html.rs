//! `html` adapter: one listing page, one record per card.
//!
//! Selectors come from the source's `[sources.adapter]` table. Field
//! selectors are evaluated inside each card; relative links and image URLs
//! are resolved against the page URL.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use agenda_shared::{AgendaError, HtmlSelectors, RawEventRecord, Result};

use super::SourceAdapter;

/// Compiled card selectors.
struct CardSelectors {
    card: Selector,
    title: Selector,
    location: Option<Selector>,
    date: Option<Selector>,
    date_month: Option<Selector>,
    link: Option<Selector>,
    image: Option<Selector>,
    category: Option<Selector>,
}

pub struct HtmlAdapter {
    name: String,
    url: Url,
    selectors: CardSelectors,
    client: Client,
}

impl HtmlAdapter {
    /// Compile the selectors up front so a typo fails at startup, not per fetch.
    pub fn new(name: &str, config: &HtmlSelectors, client: Client) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| AgendaError::config(format!("source '{name}': invalid url: {e}")))?;

        let compile = |css: &str| {
            Selector::parse(css).map_err(|e| {
                AgendaError::config(format!("source '{name}': invalid selector '{css}': {e}"))
            })
        };
        let compile_opt = |css: &Option<String>| css.as_deref().map(|c| compile(c)).transpose();

        let selectors = CardSelectors {
            card: compile(&config.card)?,
            title: compile(&config.title)?,
            location: compile_opt(&config.location)?,
            date: compile_opt(&config.date)?,
            date_month: compile_opt(&config.date_month)?,
            link: compile_opt(&config.link)?,
            image: compile_opt(&config.image)?,
            category: compile_opt(&config.category)?,
        };

        Ok(Self {
            name: name.to_string(),
            url,
            selectors,
            client,
        })
    }

    /// Extract every card of a parsed listing page.
    fn extract(&self, body: &str) -> Vec<RawEventRecord> {
        let doc = Html::parse_document(body);
        doc.select(&self.selectors.card)
            .map(|card| self.extract_card(card))
            .collect()
    }

    fn extract_card(&self, card: ElementRef<'_>) -> RawEventRecord {
        let s = &self.selectors;

        let date = match (
            field_text(card, s.date.as_ref()),
            field_text(card, s.date_month.as_ref()),
        ) {
            (Some(day), Some(month)) => Some(format!("{day} {month}")),
            (day, None) => day,
            (None, month) => month,
        };

        let link = match &s.link {
            Some(sel) => card.select(sel).next().and_then(|a| a.value().attr("href")),
            None => card.value().attr("href"),
        }
        .and_then(|href| self.resolve(href))
        .unwrap_or_default();

        let image = s
            .image
            .as_ref()
            .and_then(|sel| card.select(sel).next())
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .and_then(|src| self.resolve(src));

        RawEventRecord {
            title: field_text(card, Some(&s.title)).unwrap_or_default(),
            location: field_text(card, s.location.as_ref()),
            date,
            link,
            image,
            source: self.name.clone(),
            category_hint: field_text(card, s.category.as_ref()),
            region: String::new(),
        }
    }

    fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with("javascript:") {
            return None;
        }
        self.url.join(href).ok().map(|u| u.to_string())
    }
}

#[async_trait]
impl SourceAdapter for HtmlAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(source = %self.name, url = %self.url))]
    async fn fetch(&self) -> Result<Vec<RawEventRecord>> {
        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .await
            .map_err(|e| AgendaError::Network(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgendaError::Network(format!("{}: HTTP {status}", self.url)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AgendaError::Network(format!("{}: body read failed: {e}", self.url)))?;

        let records = self.extract(&body);
        if records.is_empty() {
            warn!("card selector matched nothing");
        }
        debug!(records = records.len(), "page extracted");
        Ok(records)
    }
}

/// Whitespace-collapsed text of the first match, `None` when absent or blank.
fn field_text(card: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    let el = card.select(selector?).next()?;
    let text = el
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::adapters::http_client;

    const LISTING: &str = r#"<html><body>
        <div class="grid">
            <a class="card" href="/evento/rock-acustico?utm_source=home">
                <img src="/img/rock.png">
                <h3>  Show de Rock
                    Acústico </h3>
                <p class="place">Boteco do Zé, Vitória</p>
                <div class="date">17 de Ago às 14:00</div>
            </a>
            <a class="card" href="https://other.example/evento/yoga">
                <h3>Yoga ao Ar Livre</h3>
                <span class="tag">Bem-estar</span>
            </a>
            <a class="card" href="/evento/sem-titulo"><h3> </h3></a>
        </div>
    </body></html>"#;

    fn selectors(url: &str) -> HtmlSelectors {
        HtmlSelectors {
            url: url.to_string(),
            card: "a.card".into(),
            title: "h3".into(),
            location: Some("p.place".into()),
            date: Some("div.date".into()),
            date_month: None,
            link: None,
            image: Some("img".into()),
            category: Some("span.tag".into()),
        }
    }

    fn adapter(config: &HtmlSelectors) -> HtmlAdapter {
        let client = http_client(Duration::from_secs(5)).expect("client");
        HtmlAdapter::new("sympla", config, client).expect("adapter")
    }

    #[test]
    fn extracts_card_fields() {
        let adapter = adapter(&selectors("https://www.sympla.com.br/eventos/vitoria-es"));
        let records = adapter.extract(LISTING);
        assert_eq!(records.len(), 3);

        let rock = &records[0];
        assert_eq!(rock.title, "Show de Rock Acústico");
        assert_eq!(rock.location.as_deref(), Some("Boteco do Zé, Vitória"));
        assert_eq!(rock.date.as_deref(), Some("17 de Ago às 14:00"));
        assert_eq!(
            rock.link,
            "https://www.sympla.com.br/evento/rock-acustico?utm_source=home"
        );
        assert_eq!(
            rock.image.as_deref(),
            Some("https://www.sympla.com.br/img/rock.png")
        );
        assert_eq!(rock.source, "sympla");

        let yoga = &records[1];
        assert_eq!(yoga.link, "https://other.example/evento/yoga");
        assert_eq!(yoga.category_hint.as_deref(), Some("Bem-estar"));
        assert!(yoga.date.is_none());

        // Blank titles are passed through; the pipeline reports them.
        assert!(records[2].title.is_empty());
    }

    #[test]
    fn joins_split_date_fragments() {
        let page = r#"<ul>
            <li class="ev"><a href="/e/1">Forró</a><b>20</b><i>ago.</i></li>
        </ul>"#;
        let config = HtmlSelectors {
            url: "https://onticket.com.br/".into(),
            card: "li.ev".into(),
            title: "a".into(),
            location: None,
            date: Some("b".into()),
            date_month: Some("i".into()),
            link: Some("a".into()),
            image: None,
            category: None,
        };
        let records = adapter(&config).extract(page);
        assert_eq!(records[0].date.as_deref(), Some("20 ago."));
        assert_eq!(records[0].link, "https://onticket.com.br/e/1");
    }

    #[tokio::test]
    async fn fetches_listing_from_server() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/eventos"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&server)
            .await;

        let adapter = adapter(&selectors(&format!("{}/eventos", server.uri())));
        let records = adapter.fetch().await.expect("fetch");

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0].link,
            format!("{}/evento/rock-acustico?utm_source=home", server.uri())
        );
    }

    #[tokio::test]
    async fn http_error_fails_the_batch() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = adapter(&selectors(&server.uri()));
        let err = adapter.fetch().await.unwrap_err();
        assert!(matches!(err, AgendaError::Network(_)));
    }
}
