//! Server-owned records behind the CRUD screens (marketplace, community,
//! groups, clans, trackers, quests).
//!
//! Each screen keeps a cached list that is fetched on demand and reloaded in
//! full after every create/update/delete.

use crate::error::Result;
use crate::network::ApiClient;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection path relative to the API base URL.
    const PATH: &'static str;

    fn id(&self) -> &str;
}

/// Query parameters for list endpoints (search text, category, game...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pairs: Vec<(String, String)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.pairs.retain(|(k, _)| k != key);
        if !value.is_empty() {
            self.pairs.push((key.to_string(), value.to_string()));
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

macro_rules! resource {
    ($(#[$meta:meta])* $name:ident, $path:literal { $($field:ident : $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            #[serde(rename = "_id")]
            pub id: String,
            $(
                #[serde(default)]
                pub $field: $ty,
            )*
            #[serde(default)]
            pub created_at: Option<DateTime<Utc>>,
            /// Fields this client does not model, kept so records round-trip.
            #[serde(flatten)]
            pub extra: Map<String, Value>,
        }

        impl Resource for $name {
            const PATH: &'static str = $path;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

resource!(
    /// Marketplace trade listing.
    Listing, "/marketplace/listings" {
        title: String,
        description: Option<String>,
        price: Option<f64>,
        category: Option<String>,
        seller_id: Option<String>,
        status: Option<String>,
    }
);

resource!(
    /// Community forum thread.
    Discussion, "/community/discussions" {
        title: String,
        content: Option<String>,
        author_id: Option<String>,
        category: Option<String>,
        reply_count: u32,
    }
);

resource!(Post, "/community/posts" {
    discussion_id: Option<String>,
    content: String,
    author_id: Option<String>,
});

resource!(Group, "/groups" {
    name: String,
    description: Option<String>,
    members: Vec<String>,
});

resource!(Clan, "/clans" {
    name: String,
    tag: Option<String>,
    description: Option<String>,
    leader_id: Option<String>,
    members: Vec<String>,
});

resource!(Tracker, "/trackers" {
    name: String,
    category: Option<String>,
    progress: Option<f64>,
});

resource!(Quest, "/quests" {
    title: String,
    description: Option<String>,
    trader: Option<String>,
    objectives: Vec<String>,
    completed: bool,
});

/// Posts live under their discussion.
pub async fn list_posts(api: &ApiClient, discussion_id: &str) -> Result<Vec<Post>> {
    let path = format!("{}/{}/posts", Discussion::PATH, discussion_id);
    api.list_at(&path, &Filter::new()).await
}

/// Cached list for one resource type plus the filter it was loaded with.
#[derive(Debug, Clone)]
pub struct ResourceCache<R: Resource> {
    items: Vec<R>,
    filter: Filter,
}

impl<R: Resource> Default for ResourceCache<R> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            filter: Filter::default(),
        }
    }
}

impl<R: Resource> ResourceCache<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[R] {
        &self.items
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn get(&self, id: &str) -> Option<&R> {
        self.items.iter().find(|r| r.id() == id)
    }

    /// Fetch with a new filter. On failure the previous list is kept.
    pub async fn reload(&mut self, api: &ApiClient, filter: Filter) -> Result<&[R]> {
        let items = api.list::<R>(&filter).await?;
        self.filter = filter;
        self.items = items;
        Ok(&self.items)
    }

    pub async fn refresh(&mut self, api: &ApiClient) -> Result<&[R]> {
        let filter = self.filter.clone();
        self.reload(api, filter).await
    }

    pub async fn create<B: Serialize + ?Sized>(&mut self, api: &ApiClient, body: &B) -> Result<R> {
        let created = api.create::<R, B>(body).await?;
        self.refresh(api).await?;
        Ok(created)
    }

    pub async fn update<B: Serialize + ?Sized>(&mut self, api: &ApiClient, id: &str, body: &B) -> Result<R> {
        let updated = api.update::<R, B>(id, body).await?;
        self.refresh(api).await?;
        Ok(updated)
    }

    pub async fn delete(&mut self, api: &ApiClient, id: &str) -> Result<()> {
        api.delete::<R>(id).await?;
        self.refresh(api).await?;
        Ok(())
    }
}
