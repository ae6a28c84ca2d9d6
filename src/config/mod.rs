//! Configuration module

mod site;

pub use site::HighlightConfig;
pub use site::MailConfig;
pub use site::SiteConfig;
pub use site::WebhookConfig;
