//! Shared fixtures for the logout flow tests

use base64::{engine::general_purpose::STANDARD, Engine};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder};
use saml_slo::{
    Binding, InMemoryTransactionStore, LogoutOrchestrator, NoopSessionCleaner, SessionParticipant,
    SessionParticipants, SharedSessionParticipants, SigningCredentials, SloConfig,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct TestKeys {
    pub credentials: SigningCredentials,
    pub certificate_pem: String,
}

/// Generate a fresh RSA-2048 key pair and self-signed certificate.
pub fn generate_keys(common_name: &str) -> TestKeys {
    let rsa = Rsa::generate(2048).unwrap();
    let key = PKey::from_rsa(rsa).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    let certificate = builder.build();

    let certificate_pem = String::from_utf8(certificate.to_pem().unwrap()).unwrap();
    let key_pem = String::from_utf8(key.private_key_to_pem_pkcs8().unwrap()).unwrap();
    let credentials = SigningCredentials::from_pem(&certificate_pem, &key_pem).unwrap();

    TestKeys {
        credentials,
        certificate_pem,
    }
}

/// Engine config using Redirect + deflate, so test assertions can read the
/// outbound messages back out of redirect query strings.
pub fn redirect_config() -> SloConfig {
    let keys = generate_keys("idp");
    let mut config = SloConfig::new("https://idp.example.com", keys.credentials);
    config.protocol_binding = Binding::HttpRedirect;
    config.deflate = true;
    config
}

/// Engine config using the default HTTP-POST binding.
pub fn post_config() -> SloConfig {
    let keys = generate_keys("idp");
    SloConfig::new("https://idp.example.com", keys.credentials)
}

pub fn participant(sp_id: &str, session_index: &str, name_id: &str) -> SessionParticipant {
    SessionParticipant {
        service_provider_id: Some(sp_id.to_string()),
        session_index: session_index.to_string(),
        name_id: name_id.to_string(),
        name_id_format: Some("urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress".to_string()),
        service_provider_logout_url: format!("https://{sp_id}.example.com/logout"),
        service_provider_logout_binding: None,
        cert: None,
        thumbprint: None,
    }
}

pub struct Harness {
    pub orchestrator: LogoutOrchestrator,
    pub participants: SharedSessionParticipants,
}

pub fn harness(config: SloConfig, participants: Vec<SessionParticipant>) -> Harness {
    let participants: SharedSessionParticipants =
        Arc::new(Mutex::new(SessionParticipants::new(participants)));
    let orchestrator = LogoutOrchestrator::new(
        Arc::new(config),
        participants.clone(),
        Arc::new(InMemoryTransactionStore::new()),
        Arc::new(NoopSessionCleaner),
    );
    Harness {
        orchestrator,
        participants,
    }
}

/// Split a redirect location into decoded query parameters.
pub fn parse_location_query(location: &str) -> HashMap<String, String> {
    let query = location.split_once('?').map(|(_, q)| q).unwrap_or("");
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| {
            (
                k.to_string(),
                urlencoding::decode(v).unwrap_or_default().into_owned(),
            )
        })
        .collect()
}

/// Base64-encode a crafted message the way an SP would deliver it over
/// POST or an undeflated redirect.
pub fn encode_message(xml: &str) -> String {
    STANDARD.encode(xml.as_bytes())
}

/// Pull the hidden message field out of an auto-submit form.
pub fn form_field<'a>(html: &'a str, param: &str) -> Option<&'a str> {
    let marker = format!("name=\"{param}\" value=\"");
    html.split(&marker).nth(1)?.split('"').next()
}
