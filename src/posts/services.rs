use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::repo::UserRepo;
use crate::auth::repo_types::User;
use crate::error::AppError;
use crate::posts::dto::{Page, PageParams, PostRequest};
use crate::posts::repo::PostRepo;
use crate::posts::repo_types::{NewPost, Post};

/// Only the owner may update or delete a post.
pub fn can_mutate(post: &Post, acting: &User) -> bool {
    post.user_id == acting.id
}

pub async fn create_post(
    posts: &dyn PostRepo,
    author: &User,
    req: PostRequest,
) -> Result<Post, AppError> {
    let req = req.validate()?;
    let post = posts
        .insert(NewPost {
            user_id: author.id,
            title: req.title,
            content: req.content,
        })
        .await?;
    info!(post_id = %post.id, user_id = %author.id, "post created");
    Ok(post)
}

pub async fn get_post(posts: &dyn PostRepo, id: Uuid) -> Result<Post, AppError> {
    posts.find_by_id(id).await?.ok_or(AppError::NotFound("post"))
}

/// Loads the post and checks ownership: 404 before 403.
async fn get_owned_post(posts: &dyn PostRepo, id: Uuid, acting: &User) -> Result<Post, AppError> {
    let post = get_post(posts, id).await?;
    if !can_mutate(&post, acting) {
        warn!(post_id = %id, owner = %post.user_id, user_id = %acting.id, "post mutation forbidden");
        return Err(AppError::Forbidden);
    }
    Ok(post)
}

pub async fn update_post(
    posts: &dyn PostRepo,
    acting: &User,
    id: Uuid,
    req: PostRequest,
) -> Result<Post, AppError> {
    get_owned_post(posts, id, acting).await?;
    let req = req.validate()?;
    let post = posts.update(id, &req.title, &req.content).await?;
    info!(post_id = %id, user_id = %acting.id, "post updated");
    Ok(post)
}

pub async fn delete_post(posts: &dyn PostRepo, acting: &User, id: Uuid) -> Result<(), AppError> {
    get_owned_post(posts, id, acting).await?;
    posts.delete(id).await?;
    info!(post_id = %id, user_id = %acting.id, "post deleted");
    Ok(())
}

/// Newest posts first. Asking for a page past the end is NotFound, except
/// page 1 of an empty listing.
pub async fn list_posts(
    posts: &dyn PostRepo,
    author: Option<Uuid>,
    params: PageParams,
) -> Result<Page<Post>, AppError> {
    let total = posts.count(author).await?;
    if params.page > 1 && params.offset() >= total {
        return Err(AppError::NotFound("page"));
    }
    let items = posts
        .list_recent(author, params.per_page, params.offset())
        .await?;
    Ok(Page::new(items, params, total))
}

pub async fn list_user_posts(
    users: &dyn UserRepo,
    posts: &dyn PostRepo,
    username: &str,
    params: PageParams,
) -> Result<(User, Page<Post>), AppError> {
    let user = users
        .find_by_username(username)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let page = list_posts(posts, Some(user.id), params).await?;
    Ok((user, page))
}
