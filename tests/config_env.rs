use nowplaying_announcer::config::AppConfig;
use nowplaying_announcer::reconciler::{StoppedPolicy, TrackChangePolicy};
use std::env;

const ALL_VARS: &[&str] = &[
    "LASTFM_USER",
    "LASTFM_API_KEY",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHANNEL_ID",
    "SPOTIFY_CLIENT_ID",
    "SPOTIFY_CLIENT_SECRET",
    "LISTENER_NAME",
    "POLL_INTERVAL_SECS",
    "HTTP_TIMEOUT_SECS",
    "TELEGRAM_MAX_RETRIES",
    "STATE_PATH",
    "TRACK_CHANGE_POLICY",
    "STOPPED_AFTER_EMPTY_POLLS",
    "ATTRIBUTION_LABEL",
    "ATTRIBUTION_URL",
    "METRICS_ADDR",
];

fn clear_env() {
    for v in ALL_VARS {
        env::remove_var(v);
    }
}

fn set_required() {
    env::set_var("LASTFM_USER", "listener");
    env::set_var("LASTFM_API_KEY", "k");
    env::set_var("TELEGRAM_BOT_TOKEN", "123:abc");
    env::set_var("TELEGRAM_CHANNEL_ID", "@nowplaying");
}

#[serial_test::serial]
#[test]
fn defaults_apply_when_only_required_vars_are_set() {
    clear_env();
    set_required();

    let cfg = AppConfig::from_env().expect("config ok");
    assert_eq!(cfg.lastfm_user, "listener");
    assert_eq!(cfg.listener_name, "listener");
    assert_eq!(cfg.poll_interval_secs, 5);
    assert_eq!(cfg.http_timeout_secs, 10);
    assert_eq!(cfg.publish_attempts, 3);
    assert_eq!(cfg.state_path.to_str(), Some("state/last_message_id.txt"));
    assert!(cfg.spotify.is_none());
    assert_eq!(cfg.track_change, TrackChangePolicy::EditInPlace);
    assert_eq!(cfg.stopped, StoppedPolicy::LeaveInPlace);
    assert_eq!(cfg.attribution_url, "https://www.last.fm/user/listener");
    assert!(cfg.metrics_addr.is_none());
    clear_env();
}

#[serial_test::serial]
#[test]
fn missing_required_var_fails_fast_naming_it() {
    clear_env();
    set_required();
    env::remove_var("TELEGRAM_CHANNEL_ID");

    let err = AppConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("TELEGRAM_CHANNEL_ID"), "got: {err}");

    env::set_var("TELEGRAM_CHANNEL_ID", "   ");
    assert!(AppConfig::from_env().is_err(), "blank counts as missing");
    clear_env();
}

#[serial_test::serial]
#[test]
fn optional_overrides_are_parsed() {
    clear_env();
    set_required();
    env::set_var("SPOTIFY_CLIENT_ID", "id");
    env::set_var("SPOTIFY_CLIENT_SECRET", "secret");
    env::set_var("POLL_INTERVAL_SECS", "15");
    env::set_var("TRACK_CHANGE_POLICY", "post");
    env::set_var("STOPPED_AFTER_EMPTY_POLLS", "12");
    env::set_var("LISTENER_NAME", "R");
    env::set_var("METRICS_ADDR", "127.0.0.1:9100");
    env::set_var("TELEGRAM_MAX_RETRIES", "5");

    let cfg = AppConfig::from_env().expect("config ok");
    assert_eq!(cfg.spotify.as_ref().map(|s| s.client_id.as_str()), Some("id"));
    assert_eq!(cfg.poll_interval_secs, 15);
    assert_eq!(cfg.track_change, TrackChangePolicy::PostNew);
    assert_eq!(cfg.stopped, StoppedPolicy::MarkAfter(12));
    assert_eq!(cfg.template().listener_name, "R");
    assert_eq!(cfg.metrics_addr.map(|a| a.port()), Some(9100));
    assert_eq!(cfg.publish_attempts, 5);
    clear_env();
}

#[serial_test::serial]
#[test]
fn malformed_values_are_rejected() {
    clear_env();
    set_required();

    env::set_var("POLL_INTERVAL_SECS", "soon");
    assert!(AppConfig::from_env().is_err());
    env::set_var("POLL_INTERVAL_SECS", "0");
    assert!(AppConfig::from_env().is_err());
    env::remove_var("POLL_INTERVAL_SECS");

    env::set_var("TRACK_CHANGE_POLICY", "replace");
    assert!(AppConfig::from_env().is_err());
    env::remove_var("TRACK_CHANGE_POLICY");

    env::set_var("TELEGRAM_MAX_RETRIES", "-1");
    assert!(AppConfig::from_env().is_err());
    env::remove_var("TELEGRAM_MAX_RETRIES");

    env::set_var("SPOTIFY_CLIENT_ID", "only-id");
    assert!(AppConfig::from_env().is_err());
    clear_env();
}
