//! HTML bodies for account mail

use super::EmailMessage;

pub const ACTIVATION_SUBJECT: &str = "Activate Your Luk's by GoodChoice Account";
pub const STAFF_ACTIVATION_SUBJECT: &str = "Welcome! Activate Your Luk's by GoodChoice Account";
pub const PASSWORD_RESET_SUBJECT: &str = "Password Reset Request for Luk's by GoodChoice";

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn activation_email(
    to: &str,
    first_name: &str,
    activation_link: &str,
    staff_invite: bool,
) -> EmailMessage {
    let subject = if staff_invite {
        STAFF_ACTIVATION_SUBJECT
    } else {
        ACTIVATION_SUBJECT
    };
    let html = format!(
        "<p>Hi {name},</p>\
         <p>Thanks for joining Luk's by GoodChoice. Please confirm your email address to activate your account:</p>\
         <p><a href=\"{link}\">Activate my account</a></p>\
         <p>If the button does not work, copy this link into your browser:<br>{link}</p>\
         <p>If you did not create this account you can ignore this email.</p>",
        name = escape(first_name),
        link = escape(activation_link),
    );
    EmailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        html,
    }
}

pub fn password_reset_email(to: &str, first_name: &str, reset_link: &str) -> EmailMessage {
    let html = format!(
        "<p>Hi {name},</p>\
         <p>We received a request to reset your Luk's by GoodChoice password.</p>\
         <p><a href=\"{link}\">Choose a new password</a></p>\
         <p>This link can be used once. If you did not ask for a reset, no action is needed.</p>",
        name = escape(first_name),
        link = escape(reset_link),
    );
    EmailMessage {
        to: to.to_string(),
        subject: PASSWORD_RESET_SUBJECT.to_string(),
        html,
    }
}
