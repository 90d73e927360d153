use chrono::NaiveDate;
use std::sync::Arc;

use briefcast::aggregator::{Aggregator, ContentSource, FeedSource, ScrapeSource, SportsSource};
use briefcast::content::Category;
use briefcast::llm::{LlmProvider, LlmRequest, LlmResponse};
use briefcast::memory::{DeduplicationIndex, EpisodeMemory};
use briefcast::sports::ScoreboardClient;
use briefcast::usage::UsageLedger;
use common::ScrapeConfig;

const GOOD_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Game Wire</title>
    <item>
      <title>Warriors Recap: X</title>
      <link>https://example.com/recap</link>
      <pubDate>Wed, 05 Aug 2026 08:00:00 GMT</pubDate>
      <description>Full recap of last night.</description>
    </item>
  </channel>
</rss>"#;

/// No condensed categories in these tests, so the provider is never called.
struct NoProvider;

#[async_trait::async_trait]
impl LlmProvider for NoProvider {
    async fn generate(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
        anyhow::bail!("not under test")
    }

    fn provider_tag(&self) -> &str {
        "none"
    }
}

fn empty_dedup() -> DeduplicationIndex {
    DeduplicationIndex::new(
        &EpisodeMemory::default(),
        NaiveDate::from_ymd_opt(2026, 8, 6).unwrap(),
    )
}

#[tokio::test]
async fn one_timed_out_source_does_not_sink_the_category() {
    let mut server = mockito::Server::new_async().await;
    let _good = server
        .mock("GET", "/good.rss")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(GOOD_RSS)
        .create_async()
        .await;
    // Scrape target that answers far slower than the source's timeout
    let _slow = server
        .mock("GET", "/slow")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_secs(3));
            w.write_all(b"<html></html>")
        })
        .create_async()
        .await;

    let sources: Vec<Arc<dyn ContentSource>> = vec![
        Arc::new(FeedSource {
            url: format!("{}/good.rss", server.url()),
            label: "game-wire".to_string(),
            category: Category::Sports,
            max_items: 5,
            timeout_secs: 10,
        }),
        Arc::new(ScrapeSource {
            target: ScrapeConfig {
                url: format!("{}/slow", server.url()),
                label: Some("slow-site".to_string()),
                container_selector: "div".to_string(),
                title_selector: "h2".to_string(),
                summary_selector: None,
                date_selector: None,
                max_items: None,
            },
            category: Category::Sports,
            timeout_secs: 1,
        }),
    ];

    let aggregator = Aggregator::new(
        vec![Category::Sports],
        sources,
        Arc::new(NoProvider),
        Arc::new(UsageLedger::new()),
    );

    let bundle = aggregator.aggregate(&empty_dedup()).await;
    let items = bundle.items(Category::Sports);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Warriors Recap: X");
}

#[tokio::test]
async fn broken_feed_is_isolated_from_a_healthy_one() {
    let mut server = mockito::Server::new_async().await;
    let _good = server
        .mock("GET", "/good.rss")
        .with_status(200)
        .with_body(GOOD_RSS)
        .create_async()
        .await;
    // 200 with an unparseable body: a malformed payload, not a transport error
    let _bad = server
        .mock("GET", "/bad.rss")
        .with_status(200)
        .with_body("this is not xml at all")
        .create_async()
        .await;

    let sources: Vec<Arc<dyn ContentSource>> = vec![
        Arc::new(FeedSource {
            url: format!("{}/bad.rss", server.url()),
            label: "broken".to_string(),
            category: Category::News,
            max_items: 5,
            timeout_secs: 10,
        }),
        Arc::new(FeedSource {
            url: format!("{}/good.rss", server.url()),
            label: "healthy".to_string(),
            category: Category::News,
            max_items: 5,
            timeout_secs: 10,
        }),
    ];

    let aggregator = Aggregator::new(
        vec![Category::News],
        sources,
        Arc::new(NoProvider),
        Arc::new(UsageLedger::new()),
    );

    let bundle = aggregator.aggregate(&empty_dedup()).await;
    let items = bundle.items(Category::News);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].source, "healthy");
}

#[tokio::test]
async fn scrape_source_extracts_selector_records() {
    let mut server = mockito::Server::new_async().await;
    let _page = server
        .mock("GET", "/listings")
        .with_status(200)
        .with_body(
            r#"<html><body>
                <div class="listing"><h2>12 Oak St</h2><p>Three bed craftsman</p></div>
                <div class="listing"><h2>48 Pine Ave</h2><p>Downtown condo</p></div>
            </body></html>"#,
        )
        .create_async()
        .await;

    let source = ScrapeSource {
        target: ScrapeConfig {
            url: format!("{}/listings", server.url()),
            label: Some("listings".to_string()),
            container_selector: ".listing".to_string(),
            title_selector: "h2".to_string(),
            summary_selector: Some("p".to_string()),
            date_selector: None,
            max_items: None,
        },
        category: Category::RealEstate,
        timeout_secs: 10,
    };

    let result = source.fetch().await;
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.items[0].title, "12 Oak St");
    assert_eq!(result.items[1].summary, "Downtown condo");
}

#[tokio::test]
async fn sports_source_yields_at_most_one_event() {
    let mut server = mockito::Server::new_async().await;
    let _events = server
        .mock("GET", "/3/eventsday.php")
        .match_query(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("d".into(), "2026-08-05".into()),
            mockito::Matcher::UrlEncoded("l".into(), "NBA".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"events": [
                {"strEvent": "Warriors vs Kings", "strHomeTeam": "Golden State Warriors",
                 "strAwayTeam": "Sacramento Kings", "intHomeScore": "120",
                 "intAwayScore": "115", "dateEvent": "2026-08-05"}
            ]}"#,
        )
        .create_async()
        .await;

    let client = Arc::new(
        ScoreboardClient::new("3", 10)
            .expect("client")
            .with_base_url(server.url()),
    );
    let source = SportsSource {
        client,
        league: "NBA".to_string(),
        team: "Warriors".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 8, 5).unwrap(),
    };

    let result = source.fetch().await;
    assert_eq!(result.items.len(), 1);
    assert_eq!(
        result.items[0].title,
        "Golden State Warriors 120 - Sacramento Kings 115"
    );

    // A day with no matching game is empty, not an error
    let source = SportsSource {
        client: Arc::new(
            ScoreboardClient::new("3", 10)
                .expect("client")
                .with_base_url(server.url()),
        ),
        league: "NBA".to_string(),
        team: "Celtics".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 8, 5).unwrap(),
    };
    let result = source.fetch().await;
    assert!(result.items.is_empty());
}
