//! Live blog list: the client's local mirror of the newest-first feed,
//! kept current by folding in change events between fetches.

use crate::models::{BlogView, ServerEvent};

#[derive(Debug, Default)]
pub struct LiveBlogList {
    blogs: Vec<BlogView>,
}

impl LiveBlogList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace contents from a freshly fetched page.
    pub fn set_all(&mut self, blogs: Vec<BlogView>) {
        self.blogs = blogs;
    }

    pub fn blogs(&self) -> &[BlogView] {
        &self.blogs
    }

    /// Fold one server event into the list. New blogs go to the front,
    /// updates replace in place, deletes drop the entry. Events for blogs
    /// not on this page and non-blog events are ignored.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::NewBlog(payload) => {
                self.blogs.insert(0, payload.blog.clone());
            }
            ServerEvent::BlogUpdated(payload) => {
                if let Some(existing) = self.blogs.iter_mut().find(|b| b.id == payload.blog.id) {
                    *existing = payload.blog.clone();
                }
            }
            ServerEvent::BlogDeleted(payload) => {
                self.blogs.retain(|b| b.id.to_string() != payload.blog_id);
            }
            _ => {}
        }
    }
}
