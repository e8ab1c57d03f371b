//! The server's own source, embedded for the `open_source` command.

/// Every module in the crate, paired with its text at compile time.
pub const MODULES: &[(&str, &str)] = &[
    ("src/main.rs", include_str!("main.rs")),
    ("src/lib.rs", include_str!("lib.rs")),
    ("src/config.rs", include_str!("config.rs")),
    ("src/error.rs", include_str!("error.rs")),
    ("src/timeout.rs", include_str!("timeout.rs")),
    ("src/source.rs", include_str!("source.rs")),
    ("src/network/mod.rs", include_str!("network/mod.rs")),
    ("src/network/client.rs", include_str!("network/client.rs")),
    ("src/network/gateway.rs", include_str!("network/gateway.rs")),
    ("src/session/mod.rs", include_str!("session/mod.rs")),
    ("src/session/stack.rs", include_str!("session/stack.rs")),
    ("src/state/mod.rs", include_str!("state/mod.rs")),
    ("src/state/account.rs", include_str!("state/account.rs")),
    ("src/state/registry.rs", include_str!("state/registry.rs")),
    ("src/state/channels.rs", include_str!("state/channels.rs")),
    ("src/state/room.rs", include_str!("state/room.rs")),
    ("src/state/hub.rs", include_str!("state/hub.rs")),
    ("src/db/mod.rs", include_str!("db/mod.rs")),
    ("src/db/accounts.rs", include_str!("db/accounts.rs")),
    ("src/db/bans.rs", include_str!("db/bans.rs")),
    ("src/db/channels.rs", include_str!("db/channels.rs")),
    ("src/db/settings.rs", include_str!("db/settings.rs")),
    ("src/handlers/mod.rs", include_str!("handlers/mod.rs")),
    ("src/handlers/admin.rs", include_str!("handlers/admin.rs")),
    ("src/handlers/ban_filter.rs", include_str!("handlers/ban_filter.rs")),
    ("src/handlers/channel.rs", include_str!("handlers/channel.rs")),
    ("src/handlers/contacts.rs", include_str!("handlers/contacts.rs")),
    ("src/handlers/inside.rs", include_str!("handlers/inside.rs")),
    ("src/handlers/math_v1.rs", include_str!("handlers/math_v1.rs")),
    ("src/handlers/math_v2.rs", include_str!("handlers/math_v2.rs")),
    ("src/handlers/messages.rs", include_str!("handlers/messages.rs")),
    ("src/handlers/options.rs", include_str!("handlers/options.rs")),
    ("src/handlers/outside.rs", include_str!("handlers/outside.rs")),
    ("src/handlers/summary.rs", include_str!("handlers/summary.rs")),
];

/// The full listing, one element per printed line, each file introduced by
/// a ruled header.
pub fn render() -> Vec<String> {
    let mut listing = Vec::new();
    for (path, text) in MODULES {
        listing.push(format!("# {}", "=".repeat(path.len())));
        listing.push(format!("# {path}"));
        listing.extend(text.lines().map(str::to_owned));
    }
    listing
}
