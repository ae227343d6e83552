//! Username/password pairs the fake login accepts.
//!
//! The table mirrors the defaults brute-force kits try first. An empty
//! username with an empty password is an anonymous login.

const WEAK_CREDENTIALS: &[(&str, &[&str])] = &[
    ("root", &["root", "admin", "password", "123456", "toor", ""]),
    ("admin", &["admin", "password", "123456", "admin123", ""]),
    ("user", &["user", "password", "123456", ""]),
    ("ubuntu", &["ubuntu", "password", ""]),
    ("pi", &["raspberry", "pi", ""]),
    ("", &[""]),
];

/// Whether the pair appears in the weak-credential table. Case sensitive.
pub fn is_accepted(user: &str, pass: &str) -> bool {
    WEAK_CREDENTIALS
        .iter()
        .any(|(known, passwords)| *known == user && passwords.contains(&pass))
}
