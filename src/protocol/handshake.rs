//! RTMP client handshake
//!
//! The publishing client performs the simple (non-cryptographic) handshake:
//!
//! ```text
//! Client                                   Server
//!   |                                        |
//!   |------- C0 (1 byte: version) --------->|
//!   |------- C1 (1536 bytes: time+random) ->|
//!   |                                        |
//!   |<------ S0 (1 byte: version) ----------|
//!   |<------ S1 (1536 bytes: time+random) --|
//!   |------- C2 (1536 bytes: echo S1) ----->|
//!   |<------ S2 (1536 bytes: echo C1) ------|
//!   |                                        |
//!   |          [Handshake Complete]          |
//! ```
//!
//! S2 is read in full but not verified against C1; public ingests are known
//! to tamper with the random block. The chunk stream layer is engaged only
//! after the full 1536 bytes of S2 have been drained.
//!
//! Reference: RTMP Specification Section 5.2

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{HandshakeError, Result};
use crate::protocol::constants::{HANDSHAKE_SIZE, RTMP_VERSION};
use crate::transport::Transport;

/// Run the client side of the handshake over the transport.
///
/// Each read observes the transport's read deadline. On success the peer has
/// received C0, C1 and C2 and the stream is positioned at the first chunk.
pub async fn client_handshake<S>(transport: &mut Transport<S>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // C0 + C1 in one write
    let c1 = generate_packet();
    let mut c0c1 = Vec::with_capacity(1 + HANDSHAKE_SIZE);
    c0c1.push(RTMP_VERSION);
    c0c1.extend_from_slice(&c1);
    transport.write_all(&c0c1).await?;

    // S0: strict version check
    let mut s0 = [0u8; 1];
    transport.read_exact(&mut s0).await?;
    if s0[0] != RTMP_VERSION {
        return Err(HandshakeError::UnsupportedVersion(s0[0]).into());
    }

    // S1, echoed back verbatim as C2
    let mut s1 = [0u8; HANDSHAKE_SIZE];
    transport.read_exact(&mut s1).await?;
    transport.write_all(&s1).await?;

    // S2: drain the full packet, content not verified
    let mut s2 = [0u8; HANDSHAKE_SIZE];
    transport.read_exact(&mut s2).await?;

    tracing::debug!("handshake complete");
    Ok(())
}

/// Generate the C1 packet
///
/// Format (1536 bytes):
/// - Bytes 0-3: Timestamp (32-bit, big-endian)
/// - Bytes 4-7: Zero (simple handshake)
/// - Bytes 8-1535: Random data
fn generate_packet() -> [u8; HANDSHAKE_SIZE] {
    let mut packet = [0u8; HANDSHAKE_SIZE];

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0);

    packet[0..4].copy_from_slice(&timestamp.to_be_bytes());
    packet[4..8].copy_from_slice(&[0, 0, 0, 0]);

    // Pseudorandom fill seeded from the clock. The handshake random block
    // carries no security properties, so an LCG is sufficient.
    let mut seed = timestamp as u64 | 1;
    for chunk in packet[8..].chunks_mut(8) {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = seed.to_le_bytes();
        let len = chunk.len().min(8);
        chunk[..len].copy_from_slice(&bytes[..len]);
    }

    packet
}
