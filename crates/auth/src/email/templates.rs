use chrono::{DateTime, Utc};

const SIGNATURE: &str = "Best regards,\nThe HireHub Team";

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .button {{ display: inline-block; padding: 12px 24px; background-color: #4f46e5; color: white; text-decoration: none; border-radius: 4px; margin: 20px 0; }}
        .warning {{ background-color: #fff3cd; border-left: 4px solid #ffc107; padding: 12px; margin: 20px 0; }}
        .footer {{ margin-top: 30px; padding-top: 20px; border-top: 1px solid #ddd; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>{}</h2>
        {}
        <div class="footer">
            <p>Best regards,<br>The HireHub Team</p>
        </div>
    </div>
</body>
</html>"#,
        title, body
    )
}

/// Sent after registration
pub fn welcome(user_name: &str, dashboard_link: &str) -> (String, String) {
    let text = format!(
        "Hi {},\n\nWelcome to HireHub! Your account is ready.\n\nOpen your dashboard: {}\n\n{}\n",
        user_name, dashboard_link, SIGNATURE
    );

    let html = layout(
        "Welcome to HireHub",
        &format!(
            r#"<p>Hi {},</p>
        <p>Your account is ready.</p>
        <a href="{}" class="button">Open Dashboard</a>"#,
            user_name, dashboard_link
        ),
    );

    (text, html)
}

/// Invitation to join a company tenant
pub fn user_invitation(
    invited_by_name: &str,
    company_name: &str,
    invitation_link: &str,
    role_name: &str,
    expires_at: &DateTime<Utc>,
) -> (String, String) {
    let expires = expires_at.format("%Y-%m-%d %H:%M");

    let text = format!(
        r#"Hello,

{} has invited you to join {} on HireHub as a {}.

Accept the invitation and create your account:

{}

This invitation will expire at {} UTC.

If you don't want to accept this invitation, you can safely ignore this email.

{}
"#,
        invited_by_name, company_name, role_name, invitation_link, expires, SIGNATURE
    );

    let html = layout(
        "You've Been Invited!",
        &format!(
            r#"<p>Hello,</p>
        <p><strong>{}</strong> has invited you to join <strong>{}</strong> on HireHub as a {}.</p>
        <a href="{}" class="button">Accept Invitation</a>
        <p>Or copy and paste this link into your browser:</p>
        <p style="word-break: break-all; color: #666;">{}</p>
        <p>This invitation will expire at <strong>{} UTC</strong>.</p>"#,
            invited_by_name, company_name, role_name, invitation_link, invitation_link, expires
        ),
    );

    (text, html)
}

pub fn two_factor_enabled(user_name: &str) -> (String, String) {
    let text = format!(
        "Hi {},\n\nTwo-factor authentication is now enabled on your HireHub account. \
         Keep your backup codes somewhere safe.\n\nIf you did not do this, change your password immediately.\n\n{}\n",
        user_name, SIGNATURE
    );

    let html = layout(
        "Two-Factor Authentication Enabled",
        &format!(
            r#"<p>Hi {},</p>
        <p>Two-factor authentication is now enabled on your account. Keep your backup codes somewhere safe.</p>
        <div class="warning">If you did not do this, change your password immediately.</div>"#,
            user_name
        ),
    );

    (text, html)
}

pub fn two_factor_disabled(user_name: &str) -> (String, String) {
    let text = format!(
        "Hi {},\n\nTwo-factor authentication was turned off for your HireHub account.\n\n\
         If you did not do this, change your password immediately.\n\n{}\n",
        user_name, SIGNATURE
    );

    let html = layout(
        "Two-Factor Authentication Disabled",
        &format!(
            r#"<p>Hi {},</p>
        <p>Two-factor authentication was turned off for your account.</p>
        <div class="warning">If you did not do this, change your password immediately.</div>"#,
            user_name
        ),
    );

    (text, html)
}

/// Sent to the tenant owner when an invoice payment fails
pub fn payment_failed(user_name: &str, plan_name: &str, billing_link: &str) -> (String, String) {
    let text = format!(
        "Hi {},\n\nWe couldn't process the latest payment for your {} plan. \
         Please update your payment method to keep your subscription active:\n\n{}\n\n{}\n",
        user_name, plan_name, billing_link, SIGNATURE
    );

    let html = layout(
        "Payment Failed",
        &format!(
            r#"<p>Hi {},</p>
        <p>We couldn't process the latest payment for your <strong>{}</strong> plan.</p>
        <p>Please update your payment method to keep your subscription active.</p>
        <a href="{}" class="button">Update Payment Method</a>"#,
            user_name, plan_name, billing_link
        ),
    );

    (text, html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_mentions_company_role_and_link() {
        let expires = Utc::now();
        let (text, html) = user_invitation(
            "Jane Doe",
            "Acme",
            "https://app.hirehub.io/invitations/accept?token=abc",
            "manager",
            &expires,
        );

        assert!(text.contains("Jane Doe has invited you to join Acme on HireHub as a manager."));
        assert!(text.contains("token=abc"));
        assert!(html.contains("<strong>Acme</strong>"));
        assert!(html.contains("Accept Invitation"));
    }

    #[test]
    fn test_layout_escapes_css_braces() {
        let (_, html) = two_factor_enabled("Jane");
        assert!(html.contains("body { font-family"));
        assert!(html.contains("<h2>Two-Factor Authentication Enabled</h2>"));
    }
}
