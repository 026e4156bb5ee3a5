use nowplaying_announcer::metadata::{deezer, resolve_details, spotify, DetailsProvider, StaticProvider};
use nowplaying_announcer::state::TrackIdentity;

#[test]
fn spotify_search_maps_to_details() {
    let body = include_str!("fixtures/spotify_search.json");
    let d = spotify::parse_search(body)
        .expect("parse ok")
        .expect("one item");
    assert_eq!(d.album_name, "Discovery");
    assert_eq!(d.release_date, "2001-03-07");
    assert_eq!(d.cover_url, "https://i.scdn.co/image/ab67616d0000b273discovery640");
    assert_eq!(d.listen_url, "https://song.link/s/0DiWol3AO6WpXZgp0goxAV");
    assert_eq!(d.provider, "spotify");
}

#[test]
fn spotify_empty_items_is_no_match() {
    let body = include_str!("fixtures/spotify_search_empty.json");
    assert!(spotify::parse_search(body).unwrap().is_none());
}

#[test]
fn deezer_hit_and_album_date_map_to_details() {
    let hit = deezer::parse_search(include_str!("fixtures/deezer_search.json"))
        .unwrap()
        .expect("one hit");
    assert_eq!(hit.album.id, 302127);
    let released = deezer::parse_release_date(include_str!("fixtures/deezer_album.json"));
    assert_eq!(released.as_deref(), Some("2001-03-07"));

    let d = deezer::details_from_hit(hit, released).expect("hit has a cover");
    assert_eq!(d.album_name, "Discovery");
    assert_eq!(d.release_date, "2001-03-07");
    assert!(d.cover_url.contains("1000x1000"));
    assert_eq!(
        d.listen_url,
        "https://song.link/https%3A%2F%2Fwww.deezer.com%2Ftrack%2F3135556"
    );
    assert_eq!(d.provider, "deezer");
}

#[test]
fn deezer_error_object_is_no_match_and_missing_date_is_unknown() {
    assert!(deezer::parse_search(include_str!("fixtures/deezer_error.json"))
        .unwrap()
        .is_none());
    assert!(deezer::parse_release_date(r#"{"release_date":"0000-00-00"}"#).is_none());

    let hit = deezer::parse_search(include_str!("fixtures/deezer_search.json"))
        .unwrap()
        .unwrap();
    assert_eq!(
        deezer::details_from_hit(hit, None).unwrap().release_date,
        "Unknown"
    );
}

const SPOTIFY_NO_ART: &str = r#"{"tracks":{"items":[{"id":"0DiWol3AO6WpXZgp0goxAV",
  "album":{"name":"Discovery","release_date":"2001-03-07","images":[]},
  "artists":[{"external_urls":{"spotify":"https://open.spotify.com/artist/4tZwfgrHOc3mvqYlEYSvVi"}}]}]}}"#;

#[test]
fn spotify_item_without_album_art_is_no_match() {
    assert!(spotify::parse_search(SPOTIFY_NO_ART).unwrap().is_none());
}

#[test]
fn deezer_hit_without_cover_is_no_match() {
    let mut hit = deezer::parse_search(include_str!("fixtures/deezer_search.json"))
        .unwrap()
        .unwrap();
    hit.album.cover_xl = None;
    hit.album.cover_big = Some(String::new());
    assert!(deezer::details_from_hit(hit, None).is_none());
}

#[tokio::test]
async fn secondary_provider_used_when_primary_has_no_cover() {
    let hit = deezer::parse_search(include_str!("fixtures/deezer_search.json"))
        .unwrap()
        .unwrap();
    let from_deezer = deezer::details_from_hit(hit, Some("2001-03-07".into())).unwrap();

    // A primary that hands back a record without art anyway.
    let mut bare = from_deezer.clone();
    bare.cover_url.clear();
    bare.provider = "spotify";
    let primary = StaticProvider::hit("spotify", bare);
    let providers: Vec<Box<dyn DetailsProvider>> = vec![
        Box::new(primary),
        Box::new(StaticProvider::hit("deezer", from_deezer.clone())),
    ];

    let track = TrackIdentity::from_raw("Daft Punk", "One More Time");
    let got = resolve_details(&providers, &track).await.expect("deezer match");
    assert_eq!(got.provider, "deezer");
    assert!(!got.cover_url.is_empty());
}
