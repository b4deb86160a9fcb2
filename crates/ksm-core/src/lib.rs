//! # KSM Core – Secrets Manager Client Utilities
//!
//! Building blocks shared by the secrets-manager client:
//!
//! - **RFC 4226 / 6238** – TOTP generation with SHA-1, SHA-256, SHA-512 from
//!   `otpauth://` URIs
//! - **Encoding** – UTF-8, base64 (standard and URL-safe), big-endian integers, JSON
//! - **Passwords** – Character-class policies over an injectable CSPRNG
//! - **Config Store** – JSON key/value file with owner-only permissions
//!   (POSIX mode bits or Windows `icacls`), plus an in-memory backend

pub mod ksm;
