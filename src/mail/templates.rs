use crate::html::escape;

pub const RESET_PASSWORD_SUBJECT: &str = "Réinitialisation du mot de passe";

// Shown by clients that cannot render the HTML part
const HTML_FALLBACK_TEXT: &str =
    "Si vous voyez ce message, c'est que votre client email ne supporte pas les messages HTML.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

// [business] Password reset email - greets by first name when known, username otherwise
pub fn reset_password_email(first_name: Option<&str>, username: &str, reset_link: &str) -> RenderedEmail {
    let name = first_name.filter(|n| !n.trim().is_empty()).unwrap_or(username);

    let html_body = format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
    <meta charset="UTF-8">
    <title>{subject}</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f5f5f5; padding: 20px;">
    <div style="max-width: 480px; margin: 0 auto; background: white; padding: 32px; border-radius: 8px;">
        <h1 style="color: #2c3e50; font-size: 20px;">Bonjour {name},</h1>
        <p>Vous avez demandé la réinitialisation de votre mot de passe PlayFit.</p>
        <p style="text-align: center; margin: 32px 0;">
            <a href="{link}" style="background: #007bff; color: white; padding: 12px 24px; border-radius: 4px; text-decoration: none;">Réinitialiser mon mot de passe</a>
        </p>
        <p style="color: #6c757d; font-size: 14px;">Si vous n'êtes pas à l'origine de cette demande, ignorez cet email.</p>
    </div>
</body>
</html>"#,
        subject = RESET_PASSWORD_SUBJECT,
        name = escape(name),
        link = escape(reset_link),
    );

    RenderedEmail {
        subject: RESET_PASSWORD_SUBJECT.to_string(),
        html_body,
        text_body: format!("{}\n\n{}", HTML_FALLBACK_TEXT, reset_link),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_email_uses_first_name_and_escapes() {
        let email = reset_password_email(
            Some("<Zoé>"),
            "zoe99",
            "http://localhost:8000/api/auth/reset_password?uid=MQ&token=abc-def",
        );
        assert_eq!(email.subject, "Réinitialisation du mot de passe");
        assert!(email.html_body.contains("Bonjour &lt;Zoé&gt;,"));
        assert!(email.html_body.contains("uid=MQ&amp;token=abc-def"));
        assert!(email.text_body.ends_with("uid=MQ&token=abc-def"));
    }

    #[test]
    fn test_reset_email_falls_back_to_username() {
        let email = reset_password_email(Some("  "), "zoe99", "http://x");
        assert!(email.html_body.contains("Bonjour zoe99,"));
        let email = reset_password_email(None, "zoe99", "http://x");
        assert!(email.html_body.contains("Bonjour zoe99,"));
    }
}
