//! Deterministic fallback payloads
//!
//! Shapes follow the real Last.fm and Instagram responses closely enough
//! that the front end renders them without special cases.

use serde_json::{json, Value};

const ARTISTS: &[&str] = &[
    "Rush",
    "Oingo Boingo",
    "Duran Duran",
    "Tears for Fears",
    "The Cure",
    "Depeche Mode",
    "New Order",
    "Talking Heads",
    "Devo",
    "Yes",
    "Pet Shop Boys",
    "A-ha",
];

const TRACKS: &[(&str, &str, &str)] = &[
    ("Tom Sawyer", "Rush", "Moving Pictures"),
    ("Dead Man's Party", "Oingo Boingo", "Dead Man's Party"),
    ("Hungry Like the Wolf", "Duran Duran", "Rio"),
    ("Everybody Wants to Rule the World", "Tears for Fears", "Songs from the Big Chair"),
    ("Just Like Heaven", "The Cure", "Kiss Me, Kiss Me, Kiss Me"),
    ("Enjoy the Silence", "Depeche Mode", "Violator"),
    ("Blue Monday", "New Order", "Power, Corruption & Lies"),
    ("Once in a Lifetime", "Talking Heads", "Remain in Light"),
    ("Whip It", "Devo", "Freedom of Choice"),
    ("Owner of a Lonely Heart", "Yes", "90125"),
    ("West End Girls", "Pet Shop Boys", "Please"),
    ("Take On Me", "A-ha", "Hunting High and Low"),
];

const MOCK_TIMESTAMP: i64 = 1_700_000_000;

fn artist_url(name: &str) -> String {
    format!("https://www.last.fm/music/{}", name.replace(' ', "+"))
}

fn images() -> Value {
    json!([
        { "#text": "", "size": "small" },
        { "#text": "", "size": "medium" },
        { "#text": "", "size": "large" }
    ])
}

fn attr(user: &str, count: usize, extra: Option<(&str, &str)>) -> Value {
    let mut attr = json!({
        "user": user,
        "page": "1",
        "perPage": count.to_string(),
        "totalPages": "1",
        "total": count.to_string(),
    });
    if let (Some((k, v)), Some(map)) = (extra, attr.as_object_mut()) {
        map.insert(k.to_string(), Value::String(v.to_string()));
    }
    attr
}

/// Mock `user.getinfo`
pub fn lastfm_user_info(user: &str) -> Value {
    json!({
        "user": {
            "name": user,
            "realname": "Parzival",
            "url": format!("https://www.last.fm/user/{}", user),
            "country": "United States",
            "playcount": "45874",
            "artist_count": ARTISTS.len().to_string(),
            "track_count": TRACKS.len().to_string(),
            "registered": { "unixtime": "1262304000", "#text": 1_262_304_000 },
            "image": images(),
        }
    })
}

/// Mock `user.getrecenttracks`
pub fn lastfm_recent_tracks(user: &str, limit: u32) -> Value {
    let tracks: Vec<Value> = TRACKS
        .iter()
        .cycle()
        .take(limit as usize)
        .enumerate()
        .map(|(i, (name, artist, album))| {
            let uts = MOCK_TIMESTAMP - (i as i64) * 240;
            json!({
                "name": name,
                "artist": { "#text": artist },
                "album": { "#text": album },
                "url": format!("{}/_/{}", artist_url(artist), name.replace(' ', "+")),
                "image": images(),
                "date": { "uts": uts.to_string() },
            })
        })
        .collect();

    json!({
        "recenttracks": {
            "@attr": attr(user, tracks.len(), None),
            "track": tracks,
        }
    })
}

/// Mock `user.gettopartists`
pub fn lastfm_top_artists(user: &str, period: &str, limit: u32) -> Value {
    let artists: Vec<Value> = ARTISTS
        .iter()
        .take(limit as usize)
        .enumerate()
        .map(|(i, name)| {
            json!({
                "name": name,
                "playcount": (1200 - i * 75).to_string(),
                "url": artist_url(name),
                "image": images(),
                "@attr": { "rank": (i + 1).to_string() },
            })
        })
        .collect();

    json!({
        "topartists": {
            "@attr": attr(user, artists.len(), Some(("period", period))),
            "artist": artists,
        }
    })
}

/// Mock `user.gettoptracks`
pub fn lastfm_top_tracks(user: &str, period: &str, limit: u32) -> Value {
    let tracks: Vec<Value> = TRACKS
        .iter()
        .take(limit as usize)
        .enumerate()
        .map(|(i, (name, artist, _))| {
            json!({
                "name": name,
                "playcount": (300 - i * 20).to_string(),
                "artist": { "name": artist, "url": artist_url(artist) },
                "url": format!("{}/_/{}", artist_url(artist), name.replace(' ', "+")),
                "image": images(),
                "@attr": { "rank": (i + 1).to_string() },
            })
        })
        .collect();

    json!({
        "toptracks": {
            "@attr": attr(user, tracks.len(), Some(("period", period))),
            "track": tracks,
        }
    })
}

/// Mock `user.gettopalbums`
pub fn lastfm_top_albums(user: &str, period: &str, limit: u32) -> Value {
    let albums: Vec<Value> = TRACKS
        .iter()
        .take(limit as usize)
        .enumerate()
        .map(|(i, (_, artist, album))| {
            json!({
                "name": album,
                "playcount": (500 - i * 30).to_string(),
                "artist": { "name": artist, "url": artist_url(artist) },
                "url": format!("{}/{}", artist_url(artist), album.replace(' ', "+")),
                "image": images(),
                "@attr": { "rank": (i + 1).to_string() },
            })
        })
        .collect();

    json!({
        "topalbums": {
            "@attr": attr(user, albums.len(), Some(("period", period))),
            "album": albums,
        }
    })
}

/// Mock Instagram `/me`
pub fn instagram_profile() -> Value {
    json!({
        "id": "17841400000000000",
        "username": "jouster",
        "account_type": "PERSONAL",
        "media_count": 6,
    })
}

/// Mock Instagram `/me/media`
pub fn instagram_media(limit: u32) -> Value {
    let captions = [
        "Arcade night",
        "Synthwave sunset",
        "New build on the bench",
        "Record store haul",
        "Trail run",
        "Late night debugging",
    ];
    let items: Vec<Value> = captions
        .iter()
        .take(limit as usize)
        .enumerate()
        .map(|(i, caption)| {
            let id = format!("1790000000000000{}", i);
            json!({
                "id": id,
                "caption": caption,
                "media_type": "IMAGE",
                "media_url": format!("https://picsum.photos/seed/jouster{}/640/640", i),
                "permalink": format!("https://www.instagram.com/p/mock{}/", i),
                "timestamp": format!("2024-0{}-15T18:00:00+0000", (i % 9) + 1),
                "username": "jouster",
            })
        })
        .collect();

    json!({ "data": items })
}
