//! Page objects for the Salesforce screens the suite walks through.
//!
//! Each page object wraps the active [`PageHandle`](crate::PageHandle) and
//! keeps its selectors private. Page objects do not assert; they return
//! values, booleans or errors and leave the verdict to the step.

mod admin;
mod custom_email;
mod home;
mod immigration;
mod login;
mod mailbox_home;
mod mailbox_record;
mod web_form;

pub use admin::AdminPage;
pub use custom_email::CustomEmailPage;
pub use home::HomePage;
pub use immigration::{ImmigrationHomePage, ImmigrationRecordPage};
pub use login::LoginPage;
pub use mailbox_home::MailboxSyncHomePage;
pub use mailbox_record::MailboxSyncRecordPage;
pub use web_form::{extract_inquiry_number, IxtFormData, WebFormPage};
