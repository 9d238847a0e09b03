//! Email canonicalisation.

/// Canonical form of an address used for lookups.
///
/// The address is lower-cased; in the local part everything from the first
/// `+` is dropped and all dots are removed, so `John.Doe+news@gmail.com`
/// and `johndoe@gmail.com` resolve to the same account.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim().to_lowercase();
    let Some((local, domain)) = email.rsplit_once('@') else {
        return email;
    };
    let local = local.split('+').next().unwrap_or_default();
    let local: String = local.chars().filter(|c| *c != '.').collect();
    format!("{local}@{domain}")
}
