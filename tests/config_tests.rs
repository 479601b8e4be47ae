use std::env;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serial_test::serial;

use club_sessions::Config;

const VARS: &[&str] = &[
    "DATABASE_URL",
    "JWT_SECRET",
    "HOST",
    "PORT",
    "ENVIRONMENT",
    "ADMIN_EMAIL",
    "TIMEZONE",
    "FRONTEND_URL",
    "SESSION_REMINDER_HOURS_24",
    "SESSION_REMINDER_HOURS_12",
    "DEADLINE_REMINDER_HOURS",
    "SCHEDULER_TICK_SECONDS",
    "RECURRENCE_REFRESH_HOURS",
    "CHANNEL_TIMEOUT_SECONDS",
    "NOTIFICATION_CONCURRENCY",
    "PUSH_GATEWAY_URL",
    "PUSH_GATEWAY_KEY",
    "EMAIL_API_URL",
    "EMAIL_API_KEY",
    "EMAIL_FROM",
    "EMAIL_FROM_NAME",
];

fn clear_env() {
    for var in VARS {
        unsafe {
            env::remove_var(var);
        }
    }
}

fn set(key: &str, value: &str) {
    unsafe {
        env::set_var(key, value);
    }
}

#[test]
#[serial]
fn test_defaults() {
    clear_env();

    let config = Config::from_env_only().unwrap();
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 8080);
    assert_eq!(config.environment, "development");
    assert!(config.is_development());
    assert_eq!(config.timezone, "Australia/Sydney");
    assert_eq!(config.admin_email, None);
    assert_eq!(config.push_gateway_url, None);
    assert_eq!(config.email_api_url, None);
    assert_eq!(config.server_address(), "127.0.0.1:8080");

    let scheduler = config.scheduler_settings();
    assert_eq!(scheduler.tick_interval, Duration::from_secs(3600));
    assert_eq!(scheduler.reminder_lead_hours, vec![24, 12]);
    assert_eq!(scheduler.deadline_lead_hours, 6);
    assert_eq!(scheduler.recurrence_refresh, None);

    let dispatch = config.dispatch_settings();
    assert_eq!(dispatch.channel_timeout, Duration::from_secs(10));
    assert_eq!(dispatch.concurrency, 8);
}

#[test]
#[serial]
fn test_custom_values() {
    clear_env();
    set("PORT", "9090");
    set("ENVIRONMENT", "production");
    set("ADMIN_EMAIL", "captain@club.test");
    set("TIMEZONE", "Europe/London");
    set("SESSION_REMINDER_HOURS_24", "48");
    set("DEADLINE_REMINDER_HOURS", "3");
    set("SCHEDULER_TICK_SECONDS", "900");
    set("RECURRENCE_REFRESH_HOURS", "24");
    set("PUSH_GATEWAY_URL", "https://push.example.com/send");
    set("EMAIL_FROM_NAME", "Riverside Badminton");

    let config = Config::from_env_only().unwrap();
    assert_eq!(config.port, 9090);
    assert!(config.is_production());
    assert_eq!(config.admin_email.as_deref(), Some("captain@club.test"));
    assert_eq!(config.timezone, "Europe/London");
    assert_eq!(
        config.push_gateway_url.as_deref(),
        Some("https://push.example.com/send")
    );
    assert_eq!(config.email_from_name, "Riverside Badminton");

    let scheduler = config.scheduler_settings();
    assert_eq!(scheduler.tick_interval, Duration::from_secs(900));
    assert_eq!(scheduler.reminder_lead_hours, vec![48, 12]);
    assert_eq!(scheduler.deadline_lead_hours, 3);
    assert_eq!(
        scheduler.recurrence_refresh,
        Some(Duration::from_secs(24 * 3600))
    );

    clear_env();
}

#[test]
#[serial]
fn test_unparseable_and_blank_values_fall_back() {
    clear_env();
    set("PORT", "not-a-port");
    set("SCHEDULER_TICK_SECONDS", "-5");
    set("NOTIFICATION_CONCURRENCY", "0");
    set("ADMIN_EMAIL", "   ");
    set("EMAIL_API_URL", "");

    let config = Config::from_env_only().unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.scheduler_tick_seconds, 3600);
    assert_eq!(config.admin_email, None);
    assert_eq!(config.email_api_url, None);
    // zero concurrency would stall bulk sends
    assert_eq!(config.dispatch_settings().concurrency, 1);

    clear_env();
}
