//! One-shot subcommands.

use crate::config::AppConfig;
use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use raiderhub_core::resources::{
    list_posts, Clan, Discussion, Filter, Group, Listing, Quest, Resource, ResourceCache, Tracker,
};
use raiderhub_core::{AuthSession, CurrentUser, RaiderClient, UserRef};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a session token and user snapshot obtained from the web login
    LoginToken {
        token: String,
        /// Current user as JSON, e.g. '{"_id":"...","username":"..."}'
        user: String,
    },
    /// Forget the stored session
    Logout,
    /// List conversations
    Conversations,
    /// List friends with live presence
    Friends {
        /// Also list pending friend requests
        #[arg(long)]
        requests: bool,
    },
    /// Manage friends and friend requests
    Friend {
        #[command(subcommand)]
        action: FriendAction,
    },
    /// Show who is online
    Online,
    /// Mark a received message as read
    MarkRead { message_id: String },
    /// Open an interactive chat with a user
    Chat {
        peer_id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Browse one of the community collections
    Browse {
        kind: Collection,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List the replies of one discussion
    Posts { discussion_id: String },
    /// Encode an image as a data URL for upload
    EncodeImage { path: std::path::PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum FriendAction {
    Add { user_id: String },
    Accept { request_id: String },
    Decline { request_id: String },
    Remove { friend_id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Collection {
    Listings,
    Discussions,
    Groups,
    Clans,
    Trackers,
    Quests,
}

pub async fn run(command: Command, client: &mut RaiderClient, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Command::LoginToken { token, user } => {
            let user: CurrentUser =
                serde_json::from_str(&user).context("user must be a JSON object with _id and username")?;
            let username = user.username.clone();
            client.start_session(AuthSession { token, user })?;
            println!("Logged in as {}", username);
        }
        Command::Logout => {
            client.logout()?;
            println!("Logged out");
        }
        Command::Conversations => {
            client.current_user()?;
            client.reload_conversations().await?;
            let conversations = client.store().conversations();
            if conversations.is_empty() {
                println!("No conversations yet");
            }
            for conv in conversations.entries() {
                let last = conv
                    .last_message
                    .as_ref()
                    .map(|m| m.content.as_str())
                    .unwrap_or("");
                let unread = if conv.unread_count > 0 {
                    format!(" ({} unread)", conv.unread_count)
                } else {
                    String::new()
                };
                println!("{:<20} {}{}  {}", conv.other_user.username, conv.other_user.id, unread, last);
            }
        }
        Command::Friends { requests } => {
            client.current_user()?;
            // Presence comes from the socket snapshot; without it everyone reads offline.
            let mut events = client.connect()?;
            crate::chat::await_presence(client, &mut events).await;

            let friends = client.friends().await?;
            if friends.is_empty() {
                println!("No friends yet");
            }
            for friend in friends {
                let status = friend.status.map(|s| s.to_string()).unwrap_or_default();
                println!("{:<20} {:<10} {}", friend.username, status, friend.id);
            }

            if requests {
                for req in client.api().list_friend_requests().await? {
                    println!("request {} from {}", req.id, req.from.username);
                }
            }
            client.disconnect();
        }
        Command::Friend { action } => {
            client.current_user()?;
            let api = client.api();
            match action {
                FriendAction::Add { user_id } => {
                    api.send_friend_request(&user_id).await?;
                    println!("Friend request sent");
                }
                FriendAction::Accept { request_id } => {
                    api.respond_friend_request(&request_id, true).await?;
                    println!("Friend request accepted");
                }
                FriendAction::Decline { request_id } => {
                    api.respond_friend_request(&request_id, false).await?;
                    println!("Friend request declined");
                }
                FriendAction::Remove { friend_id } => {
                    api.remove_friend(&friend_id).await?;
                    println!("Friend removed");
                }
            }
        }
        Command::MarkRead { message_id } => {
            client.current_user()?;
            client.mark_read(&message_id).await?;
        }
        Command::Online => {
            client.current_user()?;
            let users = client.api().online_users().await?;
            for user in users {
                println!(
                    "{:<20} {}",
                    user.username.as_deref().unwrap_or(&user.user_id),
                    user.status
                );
            }
        }
        Command::Chat { peer_id, name } => {
            client.current_user()?;
            let name = name.unwrap_or_else(|| peer_id.clone());
            crate::chat::run(client, UserRef::new(&peer_id, &name), config.ui.show_timestamps).await?;
        }
        Command::Browse {
            kind,
            search,
            category,
        } => {
            let mut filter = Filter::new();
            if let Some(search) = &search {
                filter.set("search", search);
            }
            if let Some(category) = &category {
                filter.set("category", category);
            }

            match kind {
                Collection::Listings => browse::<Listing>(client, filter).await?,
                Collection::Discussions => browse::<Discussion>(client, filter).await?,
                Collection::Groups => browse::<Group>(client, filter).await?,
                Collection::Clans => browse::<Clan>(client, filter).await?,
                Collection::Trackers => browse::<Tracker>(client, filter).await?,
                Collection::Quests => browse::<Quest>(client, filter).await?,
            }
        }
        Command::Posts { discussion_id } => {
            for post in list_posts(client.api(), &discussion_id).await? {
                println!("{:<26} {}", post.id, post.content);
            }
        }
        Command::EncodeImage { path } => {
            let url = raiderhub_core::upload::encode_image_file(&path)?;
            println!("{}", url);
        }
    }

    for notice in client.drain_notices() {
        eprintln!("! {}", notice.message);
    }
    Ok(())
}

async fn browse<R: Resource>(client: &RaiderClient, filter: Filter) -> anyhow::Result<()> {
    let mut cache = ResourceCache::<R>::new();
    let items = cache.reload(client.api(), filter).await?;

    for item in items {
        let value = serde_json::to_value(item)?;
        let label = value["title"]
            .as_str()
            .or_else(|| value["name"].as_str())
            .unwrap_or("");
        println!("{:<26} {}", item.id(), label);
    }
    Ok(())
}
