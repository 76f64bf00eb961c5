use mockito::{Matcher, Server};
use std::sync::Arc;
use steamconf_core::{ClientConfig, ConfirmationClient, ConfirmationError};

const LISTING: &str = r#"<html><body>
<div id="mobileconf_list">
  <div class="mobileconf_list_entry" data-confid="10" data-key="111" data-type="2" data-accept="Send Offer" data-cancel="Cancel">
    <div class="mobileconf_list_entry_content">
      <div class="mobileconf_list_entry_description">
        <div>Trade with Alice</div>
        <div>You will give up 1 item</div>
      </div>
    </div>
  </div>
  <div class="mobileconf_list_entry" data-confid="11" data-key="222" data-type="3" data-accept="Create Listing" data-cancel="Cancel">
    <div class="mobileconf_list_entry_content">
      <div class="mobileconf_list_entry_description">
        <div>Sell - Mann Co. Supply Crate Key</div>
      </div>
    </div>
  </div>
</div>
</body></html>"#;

fn client_for(server: &Server) -> ConfirmationClient {
    let mut config = ClientConfig::new("76561198000000000", "c2VjcmV0LWtleQ==", "android:abc");
    config.base_url = server.url();
    config.web_cookies = vec!["steamLoginSecure=abc%7C%7Cdef".to_string()];
    ConfirmationClient::new(config).unwrap()
}

fn listing_query() -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("p".into(), "android:abc".into()),
        Matcher::UrlEncoded("a".into(), "76561198000000000".into()),
        Matcher::UrlEncoded("m".into(), "android".into()),
        Matcher::UrlEncoded("tag".into(), "conf".into()),
        Matcher::Regex("k=[^&]+".into()),
        Matcher::Regex(r"t=\d+".into()),
    ])
}

#[tokio::test]
async fn load_then_accept_over_http() {
    let mut server = Server::new_async().await;

    let listing = server
        .mock("GET", "/mobileconf/conf")
        .match_query(listing_query())
        .match_header("cookie", Matcher::Regex("steamLoginSecure=".into()))
        .with_status(200)
        .with_body(LISTING)
        .create_async()
        .await;

    let decision = server
        .mock("GET", "/mobileconf/ajaxop")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("tag".into(), "allow".into()),
            Matcher::UrlEncoded("op".into(), "allow".into()),
            Matcher::UrlEncoded("cid".into(), "10".into()),
            Matcher::UrlEncoded("ck".into(), "111".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let list = client.load_confirmations().await.unwrap();

    assert_eq!(list.len(), 2);
    assert_eq!(list.ids(), vec![10, 11]);

    let trade = list.get(10).unwrap();
    assert_eq!(
        trade.descriptions(),
        vec!["Trade with Alice", "You will give up 1 item"]
    );
    let listing_item = list.get(11).unwrap();

    assert!(trade.accept().await.unwrap());
    assert!(!trade.is_pending());
    assert_eq!(list.ids(), vec![11]);
    assert!(Arc::ptr_eq(&listing_item, &list.get(11).unwrap()));

    listing.assert_async().await;
    decision.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/mobileconf/conf")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body("Forbidden")
        .create_async()
        .await;

    let err = client_for(&server)
        .load_confirmations()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConfirmationError::Transport {
            status: Some(403),
            ..
        }
    ));
}

#[tokio::test]
async fn empty_body_is_reported() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/mobileconf/conf")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch_confirmation_document()
        .await
        .unwrap_err();
    assert!(matches!(err, ConfirmationError::EmptyResponse { .. }));
}

#[tokio::test]
async fn refresh_drops_missing_confirmations() {
    let mut server = Server::new_async().await;

    let first = server
        .mock("GET", "/mobileconf/conf")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(LISTING)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let list = client.load_confirmations().await.unwrap();
    let trade = list.get(10).unwrap();
    first.assert_async().await;
    first.remove_async().await;

    server
        .mock("GET", "/mobileconf/conf")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html><body><div>Nothing to confirm</div></body></html>")
        .create_async()
        .await;

    list.refresh().await.unwrap();

    assert!(list.is_empty());
    assert!(!trade.is_pending());
    assert!(matches!(
        trade.deny().await.unwrap_err(),
        ConfirmationError::Detached(10)
    ));
}
