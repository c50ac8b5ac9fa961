/// Application name
pub const APP_NAME: &str = "Missive";

/// Minimum message body length in characters (after trimming)
pub const MESSAGE_MIN_LENGTH: usize = 1;

/// Maximum message body length in characters (after trimming)
pub const MESSAGE_MAX_LENGTH: usize = 1000;

/// Message polling interval in milliseconds (3 minutes)
pub const MESSAGE_POLLING_INTERVAL_MS: u64 = 180_000;

/// Notification polling interval in milliseconds (30 seconds)
pub const NOTIFICATION_POLLING_INTERVAL_MS: u64 = 30_000;

/// Characters of the message body copied into a notification preview
pub const NOTIFICATION_PREVIEW_LENGTH: usize = 100;

/// Display name used when a message party has no resolvable username
pub const UNKNOWN_USERNAME: &str = "Unknown User";

/// Username used when an OAuth identity carries no usable name or email
pub const DEFAULT_USERNAME: &str = "User";

/// Provider recorded for email/password signups
pub const EMAIL_PROVIDER: &str = "email";

/// Environment variable naming the owner/admin user id
pub const ENV_OWNER_USER_ID: &str = "MISSIVE_OWNER_USER_ID";

/// Table / view names exposed by the backend
pub const TABLE_USER: &str = "user";
pub const TABLE_MESSAGE: &str = "message";
pub const TABLE_NOTIFICATION: &str = "notification";
pub const VIEW_MESSAGE: &str = "v_message";

/// Auth provider audit log, readable only with elevated credentials
pub const AUTH_SCHEMA: &str = "auth";
pub const TABLE_AUDIT_LOG: &str = "audit_log_entries";

/// Most recent audit entries fetched for the activity dashboard
pub const AUDIT_LOG_LIMIT: usize = 1000;

/// Audit action recorded on every successful sign-in
pub const AUTH_ACTION_SIGNED_IN: &str = "user_signedin";
