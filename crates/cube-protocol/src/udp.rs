//! UDP implementation of [`StatusQuery`] over the cube-engine info port.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::query::{PlayerStat, QueryError, ServerAddr, ServerStatus, StatusQuery, Team};
use crate::wire::{put_int, Reader};

const INFO_PING: i32 = 1;
const EXT_REQUEST: i32 = 0;
const EXT_PLAYER_STATS: i32 = 1;
const EXT_ALL_PLAYERS: i32 = -1;
const MAX_DATAGRAM: usize = 4_096;
const STATS_DRAIN_TIMEOUT_MS: u64 = 250;

/// Queries one server at a time over a short-lived UDP socket. The per-probe
/// timeout lives here, not in the scheduler.
pub struct UdpStatusQuery {
    probe_timeout: Duration,
}

impl UdpStatusQuery {
    pub fn new(probe_timeout: Duration) -> Self {
        Self { probe_timeout }
    }

    async fn exchange(&self, addr: &ServerAddr, request: &[u8]) -> Result<(UdpSocket, Vec<u8>), QueryError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((addr.host.as_str(), addr.port)).await?;
        socket.send(request).await?;

        let mut buf = vec![0_u8; MAX_DATAGRAM];
        let received = timeout(self.probe_timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| QueryError::Timeout)??;
        buf.truncate(received);
        Ok((socket, buf))
    }
}

#[async_trait]
impl StatusQuery for UdpStatusQuery {
    async fn query_status(&self, addr: &ServerAddr) -> Result<ServerStatus, QueryError> {
        let mut request = Vec::new();
        put_int(&mut request, INFO_PING);
        put_int(&mut request, 0);

        let (_socket, pong) = self.exchange(addr, &request).await?;
        parse_info_pong(&pong)
    }

    async fn query_player_stats(&self, addr: &ServerAddr) -> Result<Vec<PlayerStat>, QueryError> {
        let mut request = Vec::new();
        put_int(&mut request, EXT_REQUEST);
        put_int(&mut request, EXT_PLAYER_STATS);
        put_int(&mut request, EXT_ALL_PLAYERS);

        // Servers answer with one datagram per connected player; collect until
        // the line goes quiet.
        let (socket, first) = self.exchange(addr, &request).await?;
        let mut datagrams = vec![first];
        let mut buf = vec![0_u8; MAX_DATAGRAM];
        loop {
            match timeout(
                Duration::from_millis(STATS_DRAIN_TIMEOUT_MS),
                socket.recv(&mut buf),
            )
            .await
            {
                Ok(Ok(received)) => datagrams.push(buf[..received].to_vec()),
                Ok(Err(error)) => return Err(error.into()),
                Err(_) => break,
            }
        }

        let mut players = Vec::new();
        for datagram in &datagrams {
            if let Some(player) = parse_player_stat(datagram)? {
                players.push(player);
            }
        }
        Ok(players)
    }
}

fn parse_info_pong(pong: &[u8]) -> Result<ServerStatus, QueryError> {
    let mut reader = Reader::new(pong);
    let _ping = reader.get_int()?;
    let _millis = reader.get_int()?;
    let _protocol = reader.get_int()?;
    let mode = reader.get_int()?;
    let connected_clients = reader.get_int()?;
    let minutes_remaining = reader.get_int()?;
    let map = reader.get_string()?;
    let description = reader.get_string()?;
    let max_clients = reader.get_int()?;
    // Older servers end the pong here.
    let mastermode = if reader.remaining() > 0 {
        reader.get_int()?
    } else {
        0
    };

    Ok(ServerStatus {
        description,
        map,
        mode,
        mastermode,
        minutes_remaining,
        connected_clients: u32::try_from(connected_clients).unwrap_or(0),
        max_clients: u32::try_from(max_clients).unwrap_or(0),
    })
}

fn parse_player_stat(datagram: &[u8]) -> Result<Option<PlayerStat>, QueryError> {
    let mut reader = Reader::new(datagram);
    let _ext = reader.get_int()?;
    let _command = reader.get_int()?;
    let _client_num = reader.get_int()?;
    // The acknowledgement datagram carries the echoed header and nothing else.
    if reader.remaining() == 0 {
        return Ok(None);
    }

    let name = reader.get_string()?;
    let team = Team::from_wire(reader.get_int()?);
    let frags = reader.get_int()?;
    let deaths = reader.get_int()?;
    let teamkills = reader.get_int()?;
    let accuracy = reader.get_int()? as f32;
    let damage = reader.get_int()?;
    let flags = reader.get_int()?;

    Ok(Some(PlayerStat {
        name,
        team,
        frags,
        deaths,
        teamkills,
        accuracy,
        damage,
        flags,
    }))
}
