pub mod conversation;
pub mod friend_request;
pub mod message;
pub mod user;

pub use conversation::{Conversation, ConversationThread, DirectConversation};
pub use friend_request::{FriendRequest, PendingRequest};
pub use message::{Message, MessageKind, NewMessage};
pub use user::{NewUser, User, UserProfile, UserStatus};
