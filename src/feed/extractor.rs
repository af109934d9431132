//! Post to resources.

use std::sync::Arc;

use tracing::{debug, warn};

use super::OverflowSource;
use super::models::{Pic, Post};
use crate::progress::ProgressSink;
use crate::resource::{MediaKind, Resource};

/// Most pictures the feed lists inline; posts declaring more must be
/// expanded from their own page.
pub const INLINE_PHOTO_LIMIT: u32 = 9;

const EXPANSION_FAILED: &str = "[E] Cannot parse post. Try to set cookie using `-c`.";

/// Builds [`Resource`]s from posts.
#[derive(Clone)]
pub struct ResourceExtractor {
    overflow: Arc<dyn OverflowSource>,
    include_video: bool,
}

impl std::fmt::Debug for ResourceExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceExtractor")
            .field("include_video", &self.include_video)
            .finish_non_exhaustive()
    }
}

impl ResourceExtractor {
    #[must_use]
    pub fn new(overflow: Arc<dyn OverflowSource>, include_video: bool) -> Self {
        Self {
            overflow,
            include_video,
        }
    }

    #[must_use]
    pub fn include_video(&self) -> bool {
        self.include_video
    }

    /// Resources of one post, in display order.
    ///
    /// Pictures win over video: a video is only taken from a post without
    /// pictures. A post whose expansion fails yields nothing.
    pub async fn extract(&self, uid: &str, post: &Post, progress: &dyn ProgressSink) -> Vec<Resource> {
        let mblog = &post.mblog;
        if mblog.is_pinned() {
            return Vec::new();
        }

        if mblog.pic_num > INLINE_PHOTO_LIMIT {
            progress.line(
                &format!("Find more than {INLINE_PHOTO_LIMIT} pictures for {}!", post.permalink),
                false,
            );
            return match self.overflow.fetch_post_pics(&post.permalink).await {
                Ok(pics) => photos(uid, post, &pics),
                Err(error) => {
                    warn!(permalink = %post.permalink, error = %error, "post expansion failed");
                    progress.line(EXPANSION_FAILED, false);
                    Vec::new()
                }
            };
        }

        let pics = mblog.inline_pics();
        if !pics.is_empty() {
            return photos(uid, post, pics);
        }

        if self.include_video
            && let Some(url) = mblog.video_stream()
        {
            debug!(mid = mblog.mid, "video post");
            return vec![resource(uid, post, url.to_string(), None, MediaKind::Video)];
        }
        Vec::new()
    }
}

fn photos(uid: &str, post: &Post, pics: &[Pic]) -> Vec<Resource> {
    pics.iter()
        .zip(1_u32..)
        .filter_map(|(pic, index)| {
            pic.large
                .as_ref()
                .map(|large| resource(uid, post, large.url.clone(), Some(index), MediaKind::Photo))
        })
        .collect()
}

fn resource(uid: &str, post: &Post, url: String, index: Option<u32>, kind: MediaKind) -> Resource {
    Resource {
        uid: uid.to_string(),
        mid: post.mblog.mid,
        bid: post.mblog.bid.clone(),
        date: post.date,
        text: post.caption().to_string(),
        url,
        index,
        kind,
    }
}
