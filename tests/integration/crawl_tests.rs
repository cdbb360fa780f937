//! Integration tests for the scraping pipeline
//!
//! These tests use wiremock to serve a small fake catalog and run the full
//! paginate, extract and write cycle end-to-end.

use shelfscan::config::{Config, CrawlerConfig, FetchConfig, OutputConfig, SiteConfig};
use shelfscan::crawler::{Coordinator, ExhaustReason, RunOutcome};
use shelfscan::model::NOT_FOUND;
use shelfscan::output::{read_dataset, OutputError};
use shelfscan::ScrapeError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, dataset_path: &Path) -> Config {
    Config {
        site: SiteConfig {
            base_url: format!("{}/", base_url),
            listing_path: "catalogue/page-{page}.html".to_string(),
            asset_root: None,
        },
        fetch: FetchConfig {
            user_agent: "TestScraper/1.0".to_string(),
            timeout_secs: 5,
            connect_timeout_secs: 2,
            max_retries: 1,
            retry_delay_ms: 10,
        },
        crawler: CrawlerConfig::default(),
        output: OutputConfig {
            dataset_path: dataset_path.display().to_string(),
            seed_path: None,
        },
    }
}

/// A listing page with one product pod per slug
fn listing_page(slugs: &[&str]) -> String {
    let pods: String = slugs
        .iter()
        .map(|slug| {
            format!(
                r#"<li class="col-xs-6"><article class="product_pod">
                    <div class="image_container"><a href="{slug}/index.html"><img src="../media/thumb.jpg"></a></div>
                    <h3><a href="{slug}/index.html" title="{slug}">{slug}</a></h3>
                    <div class="product_price"><p class="price_color">£10.00</p></div>
                </article></li>"#
            )
        })
        .collect();
    format!(r#"<html><body><ol class="row">{}</ol></body></html>"#, pods)
}

/// A well-formed detail page
fn detail_page(title: &str, category: &str, price: &str, stock: u32, rating: &str) -> String {
    format!(
        r#"<html><body>
        <ul class="breadcrumb">
            <li><a href="../../index.html">Home</a></li>
            <li><a href="../category/books_1/index.html">Books</a></li>
            <li><a href="../category/books/x_2/index.html">{category}</a></li>
            <li class="active">{title}</li>
        </ul>
        <article class="product_page">
            <div id="product_gallery"><img src="../../media/cache/{stock}.jpg" alt="{title}"></div>
            <div class="product_main">
                <h1>{title}</h1>
                <p class="price_color">£{price}</p>
                <p class="instock availability"><i class="icon-ok"></i> In stock ({stock} available) </p>
                <p class="star-rating {rating}"><i class="icon-star"></i></p>
            </div>
            <div id="product_description" class="sub-header"><h2>Product Description</h2></div>
            <p>About {title}.</p>
        </article>
        </body></html>"#
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Serves a catalog: one listing page per inner slice, plus a detail page per slug
async fn mount_catalog(server: &MockServer, pages: &[&[&str]]) {
    for (i, slugs) in pages.iter().enumerate() {
        mount_page(
            server,
            &format!("/catalogue/page-{}.html", i + 1),
            listing_page(slugs),
        )
        .await;

        for slug in slugs.iter() {
            mount_page(
                server,
                &format!("/catalogue/{}/index.html", slug),
                detail_page(&format!("Title {}", slug), "Poetry", "51.77", 22, "Three"),
            )
            .await;
        }
    }
}

async fn listing_requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|request| request.url.path().to_string())
        .filter(|p| p.starts_with("/catalogue/page-"))
        .collect()
}

fn dataset_path(dir: &TempDir) -> PathBuf {
    dir.path().join("web_scraping.csv")
}

fn completed(outcome: RunOutcome) -> (shelfscan::output::RunStats, shelfscan::Dataset) {
    match outcome {
        RunOutcome::Completed { stats, dataset } => (stats, dataset),
        RunOutcome::Cancelled { .. } => panic!("run was cancelled"),
    }
}

#[tokio::test]
async fn test_pagination_visits_pages_until_missing_page() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1", "book-b_2"], &["book-c_3"]]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let mut coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let (stats, dataset) = completed(coordinator.run().await.expect("Scrape failed"));

    assert_eq!(
        listing_requests(&mock_server).await,
        vec![
            "/catalogue/page-1.html",
            "/catalogue/page-2.html",
            "/catalogue/page-3.html"
        ]
    );
    assert_eq!(stats.pages_visited, 3);
    assert_eq!(
        stats.end_reason,
        Some(ExhaustReason::NoSuchPage {
            page: 3,
            status: 404
        })
    );

    let titles: Vec<_> = dataset.iter().map(|r| r.title().to_string()).collect();
    assert_eq!(
        titles,
        vec!["Title book-a_1", "Title book-b_2", "Title book-c_3"]
    );
    let indices: Vec<_> = dataset.iter().map(|r| r.index()).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let persisted = read_dataset(&dataset_path(&dir)).expect("Failed to read dataset");
    assert_eq!(persisted, dataset);
}

#[tokio::test]
async fn test_empty_listing_page_ends_pagination() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1"]]).await;
    mount_page(
        &mock_server,
        "/catalogue/page-2.html",
        listing_page(&[]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let mut coordinator = Coordinator::new(config).unwrap();
    let (stats, dataset) = completed(coordinator.run().await.unwrap());

    assert_eq!(listing_requests(&mock_server).await.len(), 2);
    assert_eq!(stats.end_reason, Some(ExhaustReason::EmptyPage { page: 2 }));
    assert_eq!(dataset.len(), 1);
}

#[tokio::test]
async fn test_extracted_fields_over_http() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/catalogue/page-1.html",
        listing_page(&["sharp-objects_997"]),
    )
    .await;
    mount_page(
        &mock_server,
        "/catalogue/sharp-objects_997/index.html",
        detail_page("Sharp Objects", "Mystery", "47.82", 20, "Four"),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let (_, dataset) = completed(Coordinator::new(config).unwrap().run().await.unwrap());
    let record = &dataset.records()[0];

    assert_eq!(record.title(), "Sharp Objects");
    assert_eq!(record.category(), "Mystery");
    assert_eq!(record.price().to_string(), "47.82");
    assert_eq!(record.stock(), 20);
    assert_eq!(record.rating(), 4);
    assert_eq!(
        record.image(),
        format!("{}/media/cache/20.jpg", mock_server.uri())
    );
    assert_eq!(
        record.link(),
        format!("{}/catalogue/sharp-objects_997/index.html", mock_server.uri())
    );
    assert_eq!(record.description(), "About Sharp Objects.");
}

#[tokio::test]
async fn test_missing_description_and_image_fall_back() {
    let mock_server = MockServer::start().await;
    mount_page(
        &mock_server,
        "/catalogue/page-1.html",
        listing_page(&["plain_1"]),
    )
    .await;
    mount_page(
        &mock_server,
        "/catalogue/plain_1/index.html",
        r#"<html><body>
            <ul class="breadcrumb"><li><a href="/">Home</a></li><li><a href="/travel">Travel</a></li></ul>
            <h1>Plain</h1>
            <p class="price_color">£9.99</p>
            <p class="instock availability">In stock (3 available)</p>
        </body></html>"#
            .to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let (_, dataset) = completed(Coordinator::new(config).unwrap().run().await.unwrap());
    let record = &dataset.records()[0];

    assert_eq!(record.description(), NOT_FOUND);
    assert_eq!(record.image(), NOT_FOUND);
    assert_eq!(record.rating(), 0);
    assert_eq!(record.category(), "Travel");
}

#[tokio::test]
async fn test_malformed_page_is_skipped_and_run_completes() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1", "book-b_2", "book-c_3"]]).await;

    // Overrides the fourth product's page with one that has no stock digits
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[
            "book-a_1",
            "broken_4",
            "book-b_2",
            "book-c_3",
        ])))
        .with_priority(1)
        .mount(&mock_server)
        .await;
    mount_page(
        &mock_server,
        "/catalogue/broken_4/index.html",
        detail_page("Broken", "Poetry", "1.00", 0, "One")
            .replace("In stock (0 available)", "Out of stock"),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let (stats, dataset) = completed(Coordinator::new(config).unwrap().run().await.unwrap());

    assert_eq!(stats.items_discovered, 4);
    assert_eq!(stats.items_accepted, 3);
    assert_eq!(stats.skipped_malformed, 1);
    assert_eq!(stats.items_skipped(), 1);
    assert_eq!(dataset.len(), 3);
    assert!(dataset.iter().all(|r| r.title() != "Broken"));

    // Discovery order is kept; the skipped entry leaves a gap in the indices
    let indices: Vec<_> = dataset.iter().map(|r| r.index()).collect();
    assert_eq!(indices, vec![0, 2, 3]);
    assert!(dataset_path(&dir).exists());
}

#[tokio::test]
async fn test_unreachable_detail_page_is_skipped() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1"]]).await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_page(&["book-a_1", "gone_2"])),
        )
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/gone_2/index.html"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let (stats, dataset) = completed(Coordinator::new(config).unwrap().run().await.unwrap());

    assert_eq!(stats.skipped_fetch, 1);
    assert_eq!(stats.items_accepted, 1);
    assert_eq!(dataset.len(), 1);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1"]]).await;
    Mock::given(method("GET"))
        .and(path("/catalogue/book-a_1/index.html"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let (stats, dataset) = completed(Coordinator::new(config).unwrap().run().await.unwrap());

    assert_eq!(stats.items_accepted, 1);
    assert_eq!(dataset.len(), 1);
}

#[tokio::test]
async fn test_unavailable_listing_page_is_reported_separately() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1"]]).await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-2.html"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let (stats, dataset) = completed(Coordinator::new(config).unwrap().run().await.unwrap());

    let reason = stats.end_reason.expect("pagination should have ended");
    assert!(matches!(reason, ExhaustReason::Unavailable { page: 2, .. }));
    assert!(!reason.is_end_of_catalog());
    assert_eq!(dataset.len(), 1);
    assert!(dataset_path(&dir).exists());
}

#[tokio::test]
async fn test_repeated_products_are_not_duplicated() {
    let mock_server = MockServer::start().await;
    mount_catalog(
        &mock_server,
        &[&["book-a_1", "book-b_2"], &["book-b_2", "book-c_3"]],
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let (stats, dataset) = completed(Coordinator::new(config).unwrap().run().await.unwrap());

    assert_eq!(dataset.len(), 3);
    assert!(dataset.has_unique_links());
    assert_eq!(stats.items_discovered, 3);
}

#[tokio::test]
async fn test_clamped_page_numbers_end_pagination() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1"], &["book-b_2"]]).await;

    // Any page past the last one serves the last page again
    Mock::given(method("GET"))
        .and(path_regex(r"^/catalogue/page-\d+\.html$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["book-b_2"])))
        .with_priority(10)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        Coordinator::new(config).unwrap().run(),
    )
    .await
    .expect("pagination should stop on a page without new products")
    .unwrap();
    let (stats, dataset) = completed(outcome);

    assert_eq!(listing_requests(&mock_server).await.len(), 3);
    assert_eq!(stats.end_reason, Some(ExhaustReason::NoNewEntries { page: 3 }));
    assert!(stats.end_reason.as_ref().is_some_and(|r| r.is_end_of_catalog()));
    assert_eq!(dataset.len(), 2);
    assert!(dataset_path(&dir).exists());
}

#[tokio::test]
async fn test_rerun_produces_identical_dataset() {
    let mock_server = MockServer::start().await;
    mount_catalog(
        &mock_server,
        &[&["book-a_1", "book-b_2"], &["book-c_3", "book-d_4"]],
    )
    .await;

    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");

    let config = create_test_config(&mock_server.uri(), &first);
    Coordinator::new(config).unwrap().run().await.unwrap();

    let mut config = create_test_config(&mock_server.uri(), &second);
    config.crawler.max_in_flight = 4;
    Coordinator::new(config).unwrap().run().await.unwrap();

    let first_bytes = std::fs::read(&first).unwrap();
    let second_bytes = std::fs::read(&second).unwrap();
    assert!(!first_bytes.is_empty());
    assert_eq!(first_bytes, second_bytes);
}

#[tokio::test]
async fn test_concurrent_fetches_keep_discovery_order() {
    let mock_server = MockServer::start().await;
    let slugs = ["slow_1", "fast_2", "medium_3", "instant_4"];
    let delays = [300u64, 10, 150, 0];

    mount_page(
        &mock_server,
        "/catalogue/page-1.html",
        listing_page(&slugs),
    )
    .await;
    for (slug, delay) in slugs.iter().zip(delays) {
        Mock::given(method("GET"))
            .and(path(format!("/catalogue/{}/index.html", slug)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(detail_page(slug, "Fiction", "5.00", 1, "Two"))
                    .set_delay(Duration::from_millis(delay)),
            )
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), &dataset_path(&dir));
    config.crawler.max_in_flight = 4;

    let (_, dataset) = completed(Coordinator::new(config).unwrap().run().await.unwrap());

    let titles: Vec<_> = dataset.iter().map(|r| r.title().to_string()).collect();
    assert_eq!(titles, slugs);
    let indices: Vec<_> = dataset.iter().map(|r| r.index()).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_max_pages_limits_pagination() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1"], &["book-b_2"], &["book-c_3"]]).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), &dataset_path(&dir));
    config.crawler.max_pages = Some(2);

    let (stats, dataset) = completed(Coordinator::new(config).unwrap().run().await.unwrap());

    assert_eq!(listing_requests(&mock_server).await.len(), 2);
    assert_eq!(stats.end_reason, Some(ExhaustReason::PageLimit { page: 2 }));
    assert_eq!(dataset.len(), 2);
}

#[tokio::test]
async fn test_cancelled_run_discards_records() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1"]]).await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-1.html"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_page(&["book-a_1", "stuck_2"])),
        )
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/stuck_2/index.html"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dataset_path(&dir));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let outcome = Coordinator::new(config)
        .unwrap()
        .run_until_cancelled(cancel)
        .await
        .unwrap();

    assert!(outcome.is_cancelled());
    assert!(matches!(outcome, RunOutcome::Cancelled { flushed: false, .. }));
    assert!(!dataset_path(&dir).exists());
}

#[tokio::test]
async fn test_deadline_cancels_and_flushes_when_configured() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1"]]).await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-2.html"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_page(&["stuck_2"])),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/stuck_2/index.html"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), &dataset_path(&dir));
    config.crawler.deadline_secs = Some(1);
    config.crawler.flush_on_cancel = true;

    let outcome = Coordinator::new(config).unwrap().run().await.unwrap();

    assert!(matches!(outcome, RunOutcome::Cancelled { flushed: true, .. }));
    assert_eq!(outcome.stats().items_accepted, 1);

    let persisted = shelfscan::Dataset::load(&dataset_path(&dir)).unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted.records()[0].title(), "Title book-a_1");
}

#[tokio::test]
async fn test_write_failure_fails_the_run() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1"]]).await;

    let dir = TempDir::new().unwrap();
    // The destination is an existing directory, so the final rename fails.
    let config = create_test_config(&mock_server.uri(), dir.path());

    let result = Coordinator::new(config).unwrap().run().await;

    assert!(matches!(
        result,
        Err(ScrapeError::Output(OutputError::Write { .. }))
    ));
}

#[tokio::test]
async fn test_seeded_run_uses_seed_indices() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1", "book-b_2"]]).await;

    let dir = TempDir::new().unwrap();
    let seed_path = dir.path().join("products.csv");
    std::fs::write(
        &seed_path,
        format!(
            "url,index\n{uri}/catalogue/book-b_2/index.html,20\n{uri}/catalogue/book-a_1/index.html,10\n{uri}/catalogue/missing_9/index.html,90\n",
            uri = mock_server.uri()
        ),
    )
    .unwrap();

    let mut config = create_test_config(&mock_server.uri(), &dataset_path(&dir));
    config.output.seed_path = Some(seed_path.display().to_string());

    let (stats, dataset) = completed(Coordinator::from_seed(config).unwrap().run().await.unwrap());

    assert!(listing_requests(&mock_server).await.is_empty());
    assert_eq!(stats.pages_visited, 0);
    assert_eq!(stats.skipped_fetch, 1);

    let rows: Vec<_> = dataset
        .iter()
        .map(|r| (r.title().to_string(), r.index()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Title book-b_2".to_string(), 20),
            ("Title book-a_1".to_string(), 10)
        ]
    );
}

#[tokio::test]
async fn test_catalog_run_correlates_seed_indices() {
    let mock_server = MockServer::start().await;
    mount_catalog(&mock_server, &[&["book-a_1", "book-b_2"]]).await;

    let dir = TempDir::new().unwrap();
    let seed_path = dir.path().join("products.csv");
    std::fs::write(
        &seed_path,
        format!(
            "url,index\n{}/catalogue/book-b_2/index.html,77\n",
            mock_server.uri()
        ),
    )
    .unwrap();

    let mut config = create_test_config(&mock_server.uri(), &dataset_path(&dir));
    config.output.seed_path = Some(seed_path.display().to_string());

    let (_, dataset) = completed(Coordinator::new(config).unwrap().run().await.unwrap());

    let indices: Vec<_> = dataset.iter().map(|r| r.index()).collect();
    assert_eq!(indices, vec![0, 77]);
}
