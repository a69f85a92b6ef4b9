//! Built-in provider endpoints and display names.

/// Endpoints and default scopes for a well-known provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub display_name: &'static str,
    pub auth_url: &'static str,
    pub token_url: &'static str,
    pub userinfo_url: &'static str,
    /// Fallback for accounts whose profile hides the email address
    pub emails_url: Option<&'static str>,
    pub scopes: &'static [&'static str],
}

pub const GITHUB: ProviderPreset = ProviderPreset {
    name: "github",
    display_name: "GitHub",
    auth_url: "https://github.com/login/oauth/authorize",
    token_url: "https://github.com/login/oauth/access_token",
    userinfo_url: "https://api.github.com/user",
    emails_url: Some("https://api.github.com/user/emails"),
    scopes: &["read:user", "user:email"],
};

pub const GOOGLE: ProviderPreset = ProviderPreset {
    name: "google",
    display_name: "Google",
    auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo",
    emails_url: None,
    scopes: &["openid", "profile", "email"],
};

pub const GITLAB: ProviderPreset = ProviderPreset {
    name: "gitlab",
    display_name: "GitLab",
    auth_url: "https://gitlab.com/oauth/authorize",
    token_url: "https://gitlab.com/oauth/token",
    userinfo_url: "https://gitlab.com/api/v4/user",
    emails_url: None,
    scopes: &["read_user"],
};

const PRESETS: &[ProviderPreset] = &[GITHUB, GOOGLE, GITLAB];

// Providers without a preset whose names don't capitalise cleanly.
const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("linkedin", "LinkedIn"),
    ("linkedin-openid", "LinkedIn"),
    ("bitbucket", "Bitbucket"),
    ("twitter-oauth-2", "Twitter"),
];

/// Look up a preset by provider name
pub fn preset(name: &str) -> Option<&'static ProviderPreset> {
    PRESETS.iter().find(|preset| preset.name == name)
}

/// Human-facing provider name used in messages (`github` -> `GitHub`)
pub fn display_name(provider: &str) -> String {
    if let Some(preset) = preset(provider) {
        return preset.display_name.to_string();
    }
    if let Some((_, display)) = DISPLAY_NAMES.iter().find(|(name, _)| *name == provider) {
        return display.to_string();
    }

    let mut chars = provider.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(display_name("github"), "GitHub");
        assert_eq!(display_name("linkedin-openid"), "LinkedIn");
        assert_eq!(display_name("facebook"), "Facebook");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn test_github_preset_has_email_fallback() {
        let github = preset("github").expect("github preset");
        assert!(github.emails_url.is_some());
        assert!(github.scopes.contains(&"user:email"));
        assert!(preset("myspace").is_none());
    }
}
