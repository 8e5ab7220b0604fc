pub mod face_gender_lite;
