//! Extraction of join credentials from `kubeadm init` output.
//!
//! `kubeadm init` ends its output with the command other nodes run to join:
//!
//! ```text
//! kubeadm join 192.168.0.200:6443 --token j04n3m.octy8zely83cy2ts \
//!     --discovery-token-ca-cert-hash sha256:8493...
//! ```
//!
//! Only that final instruction is of interest, so parsing works backwards from
//! the end of the output.

const TOKEN_FLAG: &str = "--token ";
const HASH_FLAG: &str = "--discovery-token-ca-cert-hash";

/// Join credentials parsed from init output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinCredentials {
    pub token: String,
    pub discovery_hash: String,
}

impl JoinCredentials {
    /// True if either credential is missing.
    pub fn is_empty(&self) -> bool {
        self.token.is_empty() || self.discovery_hash.is_empty()
    }
}

/// Parses the trailing `--token <token> --discovery-token-ca-cert-hash <hash>`
/// instruction out of `kubeadm init` output.
///
/// Whitespace (including newlines and a shell line continuation) may separate
/// the two flag groups, and any amount of whitespace may follow the hash. The
/// instruction must be the last thing in the output. If it is not found, both
/// fields are empty; a miss is never an error.
pub fn parse_init_output(output: &str) -> JoinCredentials {
    parse_join_instruction(output).unwrap_or_default()
}

fn parse_join_instruction(output: &str) -> Option<JoinCredentials> {
    let output = output.trim_end();

    let hash_at = output.rfind(HASH_FLAG)?;
    let discovery_hash = single_word(&output[hash_at + HASH_FLAG.len()..])?;

    let before_hash = output[..hash_at].trim_end();
    let before_hash = before_hash
        .strip_suffix('\\')
        .map(str::trim_end)
        .unwrap_or(before_hash);

    let token_at = before_hash.rfind(TOKEN_FLAG)?;
    let token = &before_hash[token_at + TOKEN_FLAG.len()..];
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }

    Some(JoinCredentials {
        token: token.to_string(),
        discovery_hash: discovery_hash.to_string(),
    })
}

/// Returns `s` without leading whitespace if what remains is one non-empty word.
fn single_word(s: &str) -> Option<&str> {
    let word = s.trim_start();
    (!word.is_empty() && !word.contains(char::is_whitespace)).then_some(word)
}
